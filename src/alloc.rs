//! Numeric helpers: stable softmax and fixed-precision rounding.
//!
//! Both are deterministic: the same inputs always produce bit-identical output.

use crate::error::{Error, InvalidInputReason, Result};
use std::collections::BTreeMap;

/// Round `x` to `digits` decimal digits (half away from zero).
pub fn round_to(x: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (x * scale).round() / scale
}

/// Compute a stable softmax distribution over a map of scores.
///
/// - `temperature` must be finite and > 0.
/// - Uses the max-trick (log-sum-exp shift) so the largest exponent is `exp(0)`.
/// - Returns a distribution that sums to 1 (or empty if input is empty).
///
/// Fails with a computation error rather than returning NaN if any score is
/// non-finite.
pub fn softmax_map(
    scores: &BTreeMap<String, f64>,
    temperature: f64,
) -> Result<BTreeMap<String, f64>> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(Error::invalid(InvalidInputReason::InvalidTemperature(
            temperature,
        )));
    }
    if scores.is_empty() {
        return Ok(BTreeMap::new());
    }

    let max_score = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max_score.is_finite() {
        return Err(Error::computation(format!(
            "non-finite maximum score {max_score}"
        )));
    }
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    let mut denom = 0.0;
    for (k, &v) in scores.iter() {
        let x = ((v - max_score) / temperature).exp();
        if !x.is_finite() {
            return Err(Error::computation(format!(
                "non-finite exponent for arm {k:?} (score {v})"
            )));
        }
        denom += x;
        out.insert(k.clone(), x);
    }
    // The max arm contributes exp(0) = 1, so denom >= 1 for finite input.
    if !(denom.is_finite() && denom >= 1.0) {
        return Err(Error::computation(format!(
            "degenerate softmax denominator {denom}"
        )));
    }

    for v in out.values_mut() {
        *v /= denom;
    }
    Ok(out)
}
