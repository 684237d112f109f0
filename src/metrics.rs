//! Reward derivation: raw interaction counts -> click-through and conversion rates.
//!
//! Conversion rate is the optimization signal. Click-through rate is computed
//! alongside it for reporting only.

use crate::alloc::round_to;
use crate::error::{Error, InvalidInputReason, Result};
use crate::{ExperimentRecord, RewardConfig, VariantRecord};
use std::collections::BTreeSet;

/// Decimal digits kept on derived rates.
pub const RATE_PRECISION: u32 = 6;

/// Aggregated metrics for one variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariantMetrics {
    pub name: String,
    pub views: u64,
    pub total_clicks: u64,
    pub total_conversions: u64,
    /// `total_clicks / views`, rounded to [`RATE_PRECISION`] digits.
    pub ctr: f64,
    /// `total_conversions / views`, rounded to [`RATE_PRECISION`] digits.
    pub conversion_rate: f64,
}

impl VariantMetrics {
    /// The observation fed to the policy engine for this variant.
    ///
    /// Historical data is attributed per variant, so the decision is always the
    /// arm itself.
    pub fn reward_sample(&self) -> RewardSample {
        RewardSample {
            arm: self.name.clone(),
            decision: self.name.clone(),
            reward: self.conversion_rate,
        }
    }
}

/// One `(arm, decision, reward)` observation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardSample {
    pub arm: String,
    pub decision: String,
    pub reward: f64,
}

fn rate(count: u64, views: u64) -> f64 {
    if count == 0 || views == 0 {
        return 0.0;
    }
    round_to(count as f64 / views as f64, RATE_PRECISION)
}

fn checked_total<'a>(
    variant: &str,
    counts: impl Iterator<Item = (&'a String, &'a i64)>,
    negative: impl Fn(&str, i64) -> InvalidInputReason,
) -> Result<u64> {
    let mut total: u64 = 0;
    for (key, &count) in counts {
        if count < 0 {
            return Err(Error::invalid_variant(variant, negative(key.as_str(), count)));
        }
        total = total
            .checked_add(count as u64)
            .ok_or_else(|| Error::computation(format!("count overflow in variant {variant:?}")))?;
    }
    Ok(total)
}

/// Aggregate one variant's counts into rates.
///
/// A variant with zero views gets `ctr = 0` and `conversion_rate = 0`.
pub fn variant_metrics(variant: &VariantRecord, cfg: &RewardConfig) -> Result<VariantMetrics> {
    if variant.views < 0 {
        return Err(Error::invalid_variant(
            &variant.name,
            InvalidInputReason::NegativeViews(variant.views),
        ));
    }
    let views = variant.views as u64;

    let total_clicks = checked_total(&variant.name, variant.clicks.iter(), |selector, count| {
        InvalidInputReason::NegativeClicks {
            selector: selector.to_string(),
            count,
        }
    })?;

    // Every goal is validated even when only one is counted.
    let all_conversions = checked_total(
        &variant.name,
        variant.conversions.iter(),
        |goal, count| InvalidInputReason::NegativeConversions {
            goal: goal.to_string(),
            count,
        },
    )?;
    let total_conversions = match &cfg.goal {
        Some(goal) => variant.conversions.get(goal).copied().unwrap_or(0) as u64,
        None => all_conversions,
    };

    let m = VariantMetrics {
        name: variant.name.clone(),
        views,
        total_clicks,
        total_conversions,
        ctr: rate(total_clicks, views),
        conversion_rate: rate(total_conversions, views),
    };
    tracing::debug!(
        variant = %m.name,
        views = m.views,
        clicks = m.total_clicks,
        conversions = m.total_conversions,
        ctr = m.ctr,
        conversion_rate = m.conversion_rate,
        "aggregated variant"
    );
    Ok(m)
}

/// Derive the reward sample for one variant, counting every conversion goal.
pub fn aggregate(variant: &VariantRecord) -> Result<RewardSample> {
    Ok(variant_metrics(variant, &RewardConfig::default())?.reward_sample())
}

/// Aggregate every variant of an experiment, sorted by variant name.
///
/// Sorting makes downstream fitting independent of input order. Fails on an
/// empty variant set or a repeated variant name.
pub fn aggregate_experiment(
    experiment: &ExperimentRecord,
    cfg: &RewardConfig,
) -> Result<Vec<VariantMetrics>> {
    if experiment.variants.is_empty() {
        return Err(Error::invalid(InvalidInputReason::NoArms).in_experiment(&experiment.name));
    }
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(experiment.variants.len());
    for v in &experiment.variants {
        if !seen.insert(v.name.as_str()) {
            return Err(
                Error::invalid_variant(&v.name, InvalidInputReason::DuplicateArm)
                    .in_experiment(&experiment.name),
            );
        }
        out.push(variant_metrics(v, cfg).map_err(|e| e.in_experiment(&experiment.name))?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_rounded_to_six_digits() {
        let v = VariantRecord::new("control", 150)
            .with_clicks(".grid-overlay", 10)
            .with_conversions("goal", 10);
        let m = variant_metrics(&v, &RewardConfig::default()).unwrap();
        assert_eq!(m.total_clicks, 10);
        assert_eq!(m.ctr, 0.066667);
        assert_eq!(m.conversion_rate, 0.066667);
    }

    #[test]
    fn zero_views_gives_zero_rates() {
        let v = VariantRecord::new("ghost", 0)
            .with_clicks("#a", 3)
            .with_conversions("goal", 2);
        let m = variant_metrics(&v, &RewardConfig::default()).unwrap();
        assert_eq!(m.ctr, 0.0);
        assert_eq!(m.conversion_rate, 0.0);
    }

    #[test]
    fn sums_across_selectors_and_goals() {
        let v = VariantRecord::new("challenger-4", 730)
            .with_clicks(".html-snippet", 10)
            .with_clicks(".grid-overlay", 120)
            .with_conversions("shop-m-bodywear", 20)
            .with_conversions("shop-m-bras", 100);
        let s = aggregate(&v).unwrap();
        assert_eq!(s.arm, "challenger-4");
        assert_eq!(s.decision, "challenger-4");
        assert_eq!(s.reward, round_to(120.0 / 730.0, 6));
    }

    #[test]
    fn goal_filter_counts_only_that_goal() {
        let v = VariantRecord::new("a", 100)
            .with_conversions("convert", 5)
            .with_conversions("signup", 20);
        let cfg = RewardConfig {
            goal: Some("convert".to_string()),
        };
        let m = variant_metrics(&v, &cfg).unwrap();
        assert_eq!(m.total_conversions, 5);
        assert_eq!(m.conversion_rate, 0.05);

        let missing = RewardConfig {
            goal: Some("purchase".to_string()),
        };
        assert_eq!(variant_metrics(&v, &missing).unwrap().conversion_rate, 0.0);
    }

    #[test]
    fn negative_views_rejected() {
        let err = aggregate(&VariantRecord::new("bad", -1)).unwrap_err();
        assert_eq!(err.reason(), Some(&InvalidInputReason::NegativeViews(-1)));
        assert_eq!(err.variant(), Some("bad"));
    }

    #[test]
    fn negative_counts_rejected_even_when_filtered_out() {
        let v = VariantRecord::new("bad", 10)
            .with_conversions("convert", 1)
            .with_conversions("other", -4);
        let cfg = RewardConfig {
            goal: Some("convert".to_string()),
        };
        let err = variant_metrics(&v, &cfg).unwrap_err();
        assert!(matches!(
            err.reason(),
            Some(InvalidInputReason::NegativeConversions { count: -4, .. })
        ));

        let v = VariantRecord::new("bad", 10).with_clicks("#x", -2);
        let err = aggregate(&v).unwrap_err();
        assert!(matches!(
            err.reason(),
            Some(InvalidInputReason::NegativeClicks { count: -2, .. })
        ));
    }

    #[test]
    fn experiment_is_sorted_by_name() {
        let exp = ExperimentRecord::new(
            "e",
            vec![
                VariantRecord::new("control", 10),
                VariantRecord::new("challenger-2", 10),
                VariantRecord::new("challenger-10", 10),
            ],
        );
        let names: Vec<_> = aggregate_experiment(&exp, &RewardConfig::default())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["challenger-10", "challenger-2", "control"]);
    }

    #[test]
    fn experiment_rejects_duplicates_and_empty() {
        let exp = ExperimentRecord::new(
            "dup",
            vec![VariantRecord::new("a", 1), VariantRecord::new("a", 2)],
        );
        let err = aggregate_experiment(&exp, &RewardConfig::default()).unwrap_err();
        assert_eq!(err.reason(), Some(&InvalidInputReason::DuplicateArm));
        assert_eq!(err.experiment(), Some("dup"));
        assert_eq!(err.variant(), Some("a"));

        let empty = ExperimentRecord::new("empty", vec![]);
        let err = aggregate_experiment(&empty, &RewardConfig::default()).unwrap_err();
        assert_eq!(err.reason(), Some(&InvalidInputReason::NoArms));
    }

    #[test]
    fn variant_errors_carry_experiment_name() {
        let exp = ExperimentRecord::new("hero", vec![VariantRecord::new("neg", -5)]);
        let err = aggregate_experiment(&exp, &RewardConfig::default()).unwrap_err();
        assert_eq!(err.experiment(), Some("hero"));
        assert_eq!(err.variant(), Some("neg"));
    }
}
