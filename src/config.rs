//! Configuration for reward derivation, policy fitting and normalization.
//!
//! All knobs are explicit values passed into the pipeline; nothing here is
//! process-wide state.

/// Default softmax temperature.
///
/// Conversion rates live in `[0, 1]` and usually differ by a few percentage
/// points, so the temperature has to be small for those differences to move
/// traffic at all.
pub const DEFAULT_TEMPERATURE: f64 = 0.05;

/// Default allocation total (percentages).
pub const DEFAULT_TOTAL: u64 = 100;

/// Default minimum units granted to every arm.
pub const DEFAULT_FLOOR: u64 = 1;

/// How a variant's interaction counts become a reward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RewardConfig {
    /// Only count conversions recorded under this goal.
    ///
    /// `None` sums every goal.
    pub goal: Option<String>,
}

/// Softmax (Boltzmann) policy configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SoftmaxConfig {
    /// Temperature `tau` (must be finite and > 0).
    ///
    /// - small: sharpen toward the best arm
    /// - large: flatten toward uniform
    pub temperature: f64,
    /// Seed for the sampling RNG. Never used by `fit`.
    pub seed: u64,
}

impl Default for SoftmaxConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            seed: 0,
        }
    }
}

/// Integer weight normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NormalizeConfig {
    /// Weights sum to exactly this value.
    pub total: u64,
    /// Minimum units per arm. `0` disables the exploration floor.
    pub floor: u64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL,
            floor: DEFAULT_FLOOR,
        }
    }
}

/// Full configuration for [`compute_allocation_with`][crate::compute_allocation_with].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AllocationConfig {
    pub reward: RewardConfig,
    pub policy: SoftmaxConfig,
    pub normalize: NormalizeConfig,
}

impl AllocationConfig {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.policy.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.policy.seed = seed;
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.normalize.total = total;
        self
    }

    pub fn with_floor(mut self, floor: u64) -> Self {
        self.normalize.floor = floor;
        self
    }

    /// Restrict the reward to a single conversion goal.
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.reward.goal = Some(goal.into());
        self
    }
}
