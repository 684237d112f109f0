//! `rumbandit`: softmax bandit traffic allocation for A/B/n experiments.
//!
//! Turns real-user-monitoring counts (views, clicks by selector, conversions by
//! goal) for each variant of an experiment into integer traffic weights a
//! traffic splitter can consume directly.
//!
//! The pipeline runs strictly one way, each step a pure function of its inputs:
//!
//! 1. **Aggregate** ([`aggregate_experiment`]): per-variant click-through and
//!    conversion rates. Conversion rate is the reward.
//! 2. **Fit** ([`fit`]): softmax (Boltzmann) policy over mean reward per arm,
//!    temperature-scaled, rounded to 4 digits.
//! 3. **Normalize** ([`normalize`]): largest-remainder integer weights summing
//!    to exactly the configured total, with an explicit exploration floor.
//!
//! ```rust
//! use rumbandit::{compute_allocation, ExperimentRecord, VariantRecord};
//!
//! let exp = ExperimentRecord::new(
//!     "Hero Copy and CTA Test",
//!     vec![
//!         VariantRecord::new("control", 150)
//!             .with_clicks(".grid-overlay", 10)
//!             .with_conversions("goal", 10),
//!         VariantRecord::new("challenger", 100).with_conversions("goal", 50),
//!     ],
//! );
//! let weights = compute_allocation(&exp).unwrap();
//! assert_eq!(weights.total(), 100);
//! assert!(weights.get("challenger").unwrap() > 95);
//! ```
//!
//! **Goals:**
//! - **Deterministic**: same input + config → bit-identical weights. Variants
//!   are sorted by name before fitting, so input order does not matter.
//! - **Stateless**: every call recomputes from the full supplied history.
//! - **Fail loudly**: malformed input is a typed [`Error`] naming the experiment
//!   and variant; no partial weights are ever returned.
//!
//! **Non-goals:**
//! - No persisted bandit state, live traffic serving, significance testing or
//!   confidence intervals.
//!
//! The engine ([`SoftmaxPolicy`]) accepts arbitrary `(arm, decision, reward)`
//! observations and incremental updates, although the allocation pipeline always
//! supplies one aggregate observation per variant with `decision == arm`.

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod config;
pub use config::*;

mod record;
pub use record::*;

mod metrics;
pub use metrics::*;

mod alloc;
pub use alloc::*;

mod decision;
pub use decision::*;

mod policy;
pub use policy::*;

mod weights;
pub use weights::*;

mod batch;
pub use batch::*;

#[cfg(feature = "serde")]
mod document;
#[cfg(feature = "serde")]
pub use document::*;

pub const RUMBANDIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything computed for one experiment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExperimentReport {
    pub experiment: String,
    /// Per-variant metrics, sorted by variant name.
    pub metrics: Vec<VariantMetrics>,
    pub estimate: PolicyEstimate,
    pub weights: AllocationWeights,
}

/// Compute allocation weights with the default configuration
/// (temperature 0.05, total 100, floor 1, all conversion goals).
pub fn compute_allocation(experiment: &ExperimentRecord) -> Result<AllocationWeights> {
    compute_allocation_with(experiment, &AllocationConfig::default())
}

/// Compute allocation weights for one experiment.
pub fn compute_allocation_with(
    experiment: &ExperimentRecord,
    cfg: &AllocationConfig,
) -> Result<AllocationWeights> {
    compute_allocation_report(experiment, cfg).map(|r| r.weights)
}

/// Compute allocation weights plus the intermediate metrics and estimate.
pub fn compute_allocation_report(
    experiment: &ExperimentRecord,
    cfg: &AllocationConfig,
) -> Result<ExperimentReport> {
    let name = experiment.name.as_str();
    let metrics = aggregate_experiment(experiment, &cfg.reward)?;
    let samples: Vec<RewardSample> = metrics.iter().map(VariantMetrics::reward_sample).collect();
    let estimate = fit_samples(&samples, &cfg.policy).map_err(|e| e.in_experiment(name))?;
    let weights = normalize(&estimate, &cfg.normalize).map_err(|e| e.in_experiment(name))?;
    tracing::debug!(experiment = name, arms = weights.len(), "computed allocation");
    Ok(ExperimentReport {
        experiment: experiment.name.clone(),
        metrics,
        estimate,
        weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero() -> ExperimentRecord {
        ExperimentRecord::new(
            "Hero Copy and CTA Test",
            vec![
                VariantRecord::new("control", 150)
                    .with_clicks(".grid-overlay", 10)
                    .with_conversions("goal", 10),
                VariantRecord::new("challenger", 100).with_conversions("goal", 50),
            ],
        )
    }

    #[test]
    fn challenger_takes_the_majority() {
        let w = compute_allocation(&hero()).unwrap();
        assert_eq!(w.total(), 100);
        assert!(w.get("challenger").unwrap() > 95);
        assert_eq!(w.get("control"), Some(1));
    }

    #[test]
    fn report_exposes_intermediate_values() {
        let r = compute_allocation_report(&hero(), &AllocationConfig::default()).unwrap();
        assert_eq!(r.metrics[0].name, "challenger");
        assert_eq!(r.metrics[0].conversion_rate, 0.5);
        assert_eq!(r.metrics[1].conversion_rate, 0.066667);
        assert_eq!(r.metrics[1].ctr, 0.066667);
        assert_eq!(r.estimate.get("challenger"), Some(0.9998));
        assert_eq!(r.estimate.get("control"), Some(0.0002));
        assert_eq!(r.weights.get("challenger"), Some(99));
    }

    #[test]
    fn conversion_rate_above_one_is_rejected_with_context() {
        let exp = ExperimentRecord::new(
            "multi-goal",
            vec![VariantRecord::new("a", 10)
                .with_conversions("x", 8)
                .with_conversions("y", 8)],
        );
        let err = compute_allocation(&exp).unwrap_err();
        assert!(matches!(
            err.reason(),
            Some(InvalidInputReason::RewardOutOfRange(r)) if *r == 1.6
        ));
        assert_eq!(err.experiment(), Some("multi-goal"));
        assert_eq!(err.variant(), Some("a"));
    }

    #[test]
    fn bad_temperature_carries_experiment() {
        let cfg = AllocationConfig::default().with_temperature(-1.0);
        let err = compute_allocation_with(&hero(), &cfg).unwrap_err();
        assert_eq!(err.experiment(), Some("Hero Copy and CTA Test"));
    }
}
