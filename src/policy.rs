//! Softmax (Boltzmann) bandit policy.
//!
//! [`SoftmaxPolicy`] keeps a running mean reward per arm and turns those means
//! into selection probabilities with a temperature-scaled softmax. It is built
//! for incremental per-event updates; [`fit`] drives it with a batch of
//! `(arm, decision, reward)` observations and returns the point estimate.
//!
//! Fitting is fully deterministic. The seeded RNG is used only by
//! [`SoftmaxPolicy::decide`] (feature `stochastic`).

#[cfg(feature = "stochastic")]
use rand::rngs::StdRng;
#[cfg(feature = "stochastic")]
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::alloc::{round_to, softmax_map};
use crate::error::{Error, InvalidInputReason, Result};
use crate::{RewardSample, SoftmaxConfig};
#[cfg(feature = "stochastic")]
use crate::{Decision, DecisionNote};

/// Decimal digits kept on each expectation.
pub const EXPECTATION_PRECISION: u32 = 4;

/// Expected-reward estimate (selection probability) per arm.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PolicyEstimate(BTreeMap<String, f64>);

impl PolicyEstimate {
    pub fn get(&self, arm: &str) -> Option<f64> {
        self.0.get(arm).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Arms in lexicographic order with their estimates.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.0
    }
}

impl From<BTreeMap<String, f64>> for PolicyEstimate {
    fn from(m: BTreeMap<String, f64>) -> Self {
        Self(m)
    }
}

/// Common interface for incrementally updated bandit policies.
pub trait BanditPolicy {
    /// Record one observed reward in `[0, 1]` for `arm`.
    fn update_reward(&mut self, arm: &str, reward: f64) -> Result<()>;

    /// Current per-arm expected-reward estimate.
    fn expectations(&self) -> Result<PolicyEstimate>;

    /// Sample an arm from the current distribution.
    #[cfg(feature = "stochastic")]
    fn decide(&mut self) -> Result<Decision>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ArmStats {
    sum: f64,
    count: u64,
}

/// Seedable softmax bandit over a fixed arm set.
#[derive(Debug, Clone)]
pub struct SoftmaxPolicy {
    cfg: SoftmaxConfig,
    stats: BTreeMap<String, ArmStats>,
    #[cfg(feature = "stochastic")]
    rng: StdRng,
}

impl SoftmaxPolicy {
    /// Create a policy over `arms`.
    ///
    /// Fails if `arms` is empty, contains duplicates, or the temperature is not
    /// finite and positive.
    pub fn new(arms: &[String], cfg: SoftmaxConfig) -> Result<Self> {
        if arms.is_empty() {
            return Err(Error::invalid(InvalidInputReason::NoArms));
        }
        if !(cfg.temperature.is_finite() && cfg.temperature > 0.0) {
            return Err(Error::invalid(InvalidInputReason::InvalidTemperature(
                cfg.temperature,
            )));
        }
        let mut stats = BTreeMap::new();
        for a in arms {
            if stats.insert(a.clone(), ArmStats::default()).is_some() {
                return Err(Error::invalid_variant(a, InvalidInputReason::DuplicateArm));
            }
        }
        Ok(Self {
            cfg,
            stats,
            #[cfg(feature = "stochastic")]
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    pub fn config(&self) -> &SoftmaxConfig {
        &self.cfg
    }

    /// Arms in lexicographic order.
    pub fn arms(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    /// Empirical mean reward for `arm` (0 before any observation).
    pub fn mean_reward(&self, arm: &str) -> Option<f64> {
        self.stats.get(arm).map(|s| {
            if s.count == 0 {
                0.0
            } else {
                s.sum / s.count as f64
            }
        })
    }

    /// Number of observations recorded for `arm`.
    pub fn uses(&self, arm: &str) -> Option<u64> {
        self.stats.get(arm).map(|s| s.count)
    }

    /// Unrounded selection probabilities.
    pub fn probabilities(&self) -> Result<BTreeMap<String, f64>> {
        let means: BTreeMap<String, f64> = self
            .stats
            .keys()
            .map(|a| (a.clone(), self.mean_reward(a).unwrap_or(0.0)))
            .collect();
        softmax_map(&means, self.cfg.temperature)
    }
}

impl BanditPolicy for SoftmaxPolicy {
    fn update_reward(&mut self, arm: &str, reward: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&reward) {
            return Err(Error::invalid_variant(
                arm,
                InvalidInputReason::RewardOutOfRange(reward),
            ));
        }
        let Some(s) = self.stats.get_mut(arm) else {
            return Err(Error::invalid_variant(
                arm,
                InvalidInputReason::UnknownDecision(arm.to_string()),
            ));
        };
        s.sum += reward;
        s.count = s.count.saturating_add(1);
        Ok(())
    }

    /// Probabilities rounded to [`EXPECTATION_PRECISION`] digits.
    fn expectations(&self) -> Result<PolicyEstimate> {
        let probs = self.probabilities()?;
        Ok(PolicyEstimate(
            probs
                .into_iter()
                .map(|(a, p)| (a, round_to(p, EXPECTATION_PRECISION)))
                .collect(),
        ))
    }

    #[cfg(feature = "stochastic")]
    fn decide(&mut self) -> Result<Decision> {
        let probs = self.probabilities()?;
        let r: f64 = self.rng.random();
        let mut cdf = 0.0;
        for (a, &p) in &probs {
            cdf += p;
            if r < cdf {
                return Ok(Decision {
                    chosen: a.clone(),
                    probs: probs.clone(),
                    notes: vec![DecisionNote::SampledFromDistribution],
                });
            }
        }
        // `new` guarantees at least one arm.
        let last = probs.keys().next_back().cloned().unwrap_or_default();
        Ok(Decision {
            chosen: last,
            probs,
            notes: vec![
                DecisionNote::SampledFromDistribution,
                DecisionNote::NumericalFallbackToLastArm,
            ],
        })
    }
}

/// Fit a softmax policy over parallel `arms` / `decisions` / `rewards`.
///
/// Each reward is attributed to the arm named by its decision. Returns the
/// rounded expectation for every arm, exactly once each.
pub fn fit(
    arms: &[String],
    decisions: &[String],
    rewards: &[f64],
    cfg: &SoftmaxConfig,
) -> Result<PolicyEstimate> {
    if arms.len() != decisions.len() || arms.len() != rewards.len() {
        return Err(Error::invalid(InvalidInputReason::LengthMismatch {
            arms: arms.len(),
            decisions: decisions.len(),
            rewards: rewards.len(),
        }));
    }
    let mut policy = SoftmaxPolicy::new(arms, *cfg)?;
    for (decision, &reward) in decisions.iter().zip(rewards) {
        policy.update_reward(decision, reward)?;
    }
    let estimate = policy.expectations()?;
    tracing::debug!(
        arms = estimate.len(),
        temperature = cfg.temperature,
        estimate = ?estimate.as_map(),
        "fitted softmax policy"
    );
    Ok(estimate)
}

/// [`fit`] over a list of observations.
pub fn fit_samples(samples: &[RewardSample], cfg: &SoftmaxConfig) -> Result<PolicyEstimate> {
    let arms: Vec<String> = samples.iter().map(|s| s.arm.clone()).collect();
    let decisions: Vec<String> = samples.iter().map(|s| s.decision.clone()).collect();
    let rewards: Vec<f64> = samples.iter().map(|s| s.reward).collect();
    fit(&arms, &decisions, &rewards, cfg)
}
