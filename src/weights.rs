//! Integer traffic weights from a policy estimate.
//!
//! Uses largest-remainder (Hamilton) apportionment so the weights always sum to
//! exactly the configured total, then applies an explicit exploration floor:
//! every arm gets at least `floor` units, paid for one unit at a time by the
//! arm currently holding the most weight.
//!
//! Totals are capped at [`MAX_TOTAL`], where f64 quotas stop being exact.

use crate::error::{Error, InvalidInputReason, Result, MAX_TOTAL};
use crate::{NormalizeConfig, PolicyEstimate};
use std::collections::BTreeMap;

/// Integer allocation per arm. Sums to the configured total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AllocationWeights(BTreeMap<String, u64>);

impl AllocationWeights {
    pub fn get(&self, arm: &str) -> Option<u64> {
        self.0.get(arm).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.0
    }
}

/// Largest-remainder apportionment of `total` units by `shares`.
///
/// Shares need not sum to 1; they are renormalized. All-zero shares split
/// uniformly. Remainder ties go to the lexicographically first arm.
pub fn apportion(shares: &BTreeMap<String, f64>, total: u64) -> Result<BTreeMap<String, u64>> {
    if shares.is_empty() {
        return Err(Error::invalid(InvalidInputReason::NoArms));
    }
    if total > MAX_TOTAL {
        return Err(Error::invalid(InvalidInputReason::TotalTooLarge(total)));
    }
    for (arm, &s) in shares {
        if !(s.is_finite() && s >= 0.0) {
            return Err(Error::computation(format!(
                "invalid share {s} for arm {arm:?}"
            )));
        }
    }
    let sum: f64 = shares.values().sum();
    let n = shares.len() as f64;
    let quota = |s: f64| {
        if sum > 0.0 {
            s / sum * total as f64
        } else {
            total as f64 / n
        }
    };

    let mut rows: Vec<(&String, u64, f64)> = shares
        .iter()
        .map(|(arm, &s)| {
            let q = quota(s);
            let base = q.floor();
            (arm, base as u64, q - base)
        })
        .collect();

    // Stable sort keeps name order among equal remainders.
    let mut by_remainder: Vec<usize> = (0..rows.len()).collect();
    by_remainder.sort_by(|&i, &j| rows[j].2.total_cmp(&rows[i].2));

    let assigned = rows
        .iter()
        .try_fold(0u64, |acc, r| acc.checked_add(r.1))
        .ok_or_else(|| Error::computation("apportioned units overflow u64"))?;
    if assigned <= total {
        let leftover = total - assigned;
        for k in 0..leftover as usize {
            let i = by_remainder[k % by_remainder.len()];
            rows[i].1 += 1;
        }
    } else {
        // Float drift overshot; take back from the smallest remainders.
        let excess = assigned - total;
        let mut taken = 0;
        for &i in by_remainder.iter().rev().cycle() {
            if taken == excess {
                break;
            }
            if rows[i].1 > 0 {
                rows[i].1 -= 1;
                taken += 1;
            }
        }
    }

    Ok(rows
        .into_iter()
        .map(|(arm, w, _)| (arm.clone(), w))
        .collect())
}

/// Raise every arm to at least `floor` units, taking each unit from the arm
/// with the highest weight (first by name on ties).
///
/// Works a weight level at a time rather than a unit at a time: the arms tied
/// at the top are lowered together to the next level down, and a partial level
/// is split evenly with the extra units coming from the first arms by name.
/// The result matches unit-by-unit donation.
fn apply_floor(weights: &mut BTreeMap<String, u64>, floor: u64) {
    let starved: Vec<(String, u64)> = weights
        .iter()
        .filter(|&(_, &w)| w < floor)
        .map(|(a, &w)| (a.clone(), w))
        .collect();
    for (arm, have) in starved {
        let mut need = floor - have;
        while need > 0 {
            let Some(top) = weights.values().copied().filter(|&w| w > floor).max() else {
                // Unreachable when total >= floor * arms.
                return;
            };
            let next = weights
                .values()
                .copied()
                .filter(|&w| w > floor && w < top)
                .max()
                .unwrap_or(floor);
            let group: Vec<String> = weights
                .iter()
                .filter(|&(_, &w)| w == top)
                .map(|(a, _)| a.clone())
                .collect();
            let g = group.len() as u64;
            let level = (top - next).saturating_mul(g);
            let (each, extra) = if need >= level {
                (top - next, 0)
            } else {
                (need / g, need % g)
            };
            for (i, donor) in group.iter().enumerate() {
                if let Some(w) = weights.get_mut(donor) {
                    *w -= each + u64::from((i as u64) < extra);
                }
            }
            need -= level.min(need);
        }
        if let Some(w) = weights.get_mut(&arm) {
            *w = floor;
        }
    }
}

/// Convert an estimate into integer weights summing to `cfg.total`.
///
/// Fails if the estimate is empty, `cfg.total` exceeds [`MAX_TOTAL`], or
/// `cfg.total` cannot give every arm `cfg.floor` units.
pub fn normalize(estimate: &PolicyEstimate, cfg: &NormalizeConfig) -> Result<AllocationWeights> {
    let arms = estimate.len();
    if arms == 0 {
        return Err(Error::invalid(InvalidInputReason::NoArms));
    }
    if cfg.total > MAX_TOTAL {
        return Err(Error::invalid(InvalidInputReason::TotalTooLarge(cfg.total)));
    }
    let too_small = || {
        Error::invalid(InvalidInputReason::TotalTooSmall {
            total: cfg.total,
            arms,
            floor: cfg.floor,
        })
    };
    let needed = cfg.floor.checked_mul(arms as u64).ok_or_else(too_small)?;
    if needed > cfg.total {
        return Err(too_small());
    }

    let mut weights = apportion(estimate.as_map(), cfg.total)?;
    apply_floor(&mut weights, cfg.floor);

    let sum = weights
        .values()
        .try_fold(0u64, |acc, &w| acc.checked_add(w))
        .unwrap_or(u64::MAX);
    if sum != cfg.total {
        return Err(Error::computation(format!(
            "weights sum to {sum}, expected {}",
            cfg.total
        )));
    }
    tracing::debug!(total = cfg.total, floor = cfg.floor, weights = ?weights, "normalized weights");
    Ok(AllocationWeights(weights))
}
