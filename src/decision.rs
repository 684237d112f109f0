//! Decision envelope for sampled arm choices.
//!
//! A [`Decision`] is an audit-friendly record of one sampled choice: the arm,
//! the distribution it was drawn from, and typed notes explaining how.

use std::collections::BTreeMap;

/// Audit notes attached to a decision.
///
/// Prefer adding new variants over changing existing semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionNote {
    /// The arm was drawn from the softmax distribution.
    SampledFromDistribution,

    /// Floating-point CDF drift required choosing the last arm.
    NumericalFallbackToLastArm,
}

/// A single sampled choice.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    /// The selected arm name.
    pub chosen: String,
    /// Per-arm selection probabilities at decision time.
    pub probs: BTreeMap<String, f64>,
    pub notes: Vec<DecisionNote>,
}

impl Decision {
    /// Probability with which the chosen arm was selected.
    pub fn chosen_prob(&self) -> f64 {
        self.probs.get(&self.chosen).copied().unwrap_or(0.0)
    }
}
