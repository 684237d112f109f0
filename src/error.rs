//! Error types.
//!
//! Every failure carries enough context (experiment name, variant name) to
//! localize the offending input. Errors raised below the
//! [`compute_allocation`][crate::compute_allocation] boundary start without an
//! experiment name; the boundary fills it in via [`Error::in_experiment`].

use thiserror::Error;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an input was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputReason {
    #[error("negative views ({0})")]
    NegativeViews(i64),

    #[error("negative click count {count} for selector {selector:?}")]
    NegativeClicks { selector: String, count: i64 },

    #[error("negative conversion count {count} for goal {goal:?}")]
    NegativeConversions { goal: String, count: i64 },

    /// `arms`, `decisions` and `rewards` must be parallel sequences.
    #[error("length mismatch: arms={arms} decisions={decisions} rewards={rewards}")]
    LengthMismatch {
        arms: usize,
        decisions: usize,
        rewards: usize,
    },

    #[error("duplicate arm")]
    DuplicateArm,

    /// A decision named an arm outside the arm set.
    #[error("decision {0:?} is not a known arm")]
    UnknownDecision(String),

    #[error("reward {0} outside [0, 1]")]
    RewardOutOfRange(f64),

    #[error("no arms")]
    NoArms,

    #[error("temperature must be finite and > 0, got {0}")]
    InvalidTemperature(f64),

    /// The floor allocation cannot be honored for every arm.
    #[error("total {total} cannot give {arms} arms a floor of {floor} each")]
    TotalTooSmall { total: u64, arms: usize, floor: u64 },

    /// Totals past 2^53 cannot be apportioned exactly in f64.
    #[error("total {0} exceeds the largest exactly representable total {max}", max = MAX_TOTAL)]
    TotalTooLarge(u64),
}

/// Largest allocation total: every integer up to 2^53 is exact in f64.
pub const MAX_TOTAL: u64 = 1 << 53;

/// Errors produced by reward derivation, policy fitting and normalization.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range experiment/variant data.
    #[error("invalid input{}: {reason}", location(None, .experiment, .variant))]
    InvalidInput {
        experiment: Option<String>,
        variant: Option<String>,
        reason: InvalidInputReason,
    },

    /// Internal numeric failure (non-finite intermediate value).
    #[error("computation failed{}: {detail}", location(None, .experiment, &None))]
    Computation {
        experiment: Option<String>,
        detail: String,
    },

    /// The upstream JSON document, or one experiment in it, could not be decoded.
    #[error("malformed RUM document{}: {source}", location(.page.as_deref(), .experiment, &None))]
    Document {
        page: Option<String>,
        experiment: Option<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Document {
            page: None,
            experiment: None,
            source: Box::new(e),
        }
    }
}

fn location(page: Option<&str>, experiment: &Option<String>, variant: &Option<String>) -> String {
    let mut parts = Vec::new();
    if let Some(p) = page {
        parts.push(format!("page {p:?}"));
    }
    if let Some(e) = experiment {
        parts.push(format!("experiment {e:?}"));
    }
    if let Some(v) = variant {
        parts.push(format!("variant {v:?}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub(crate) fn invalid(reason: InvalidInputReason) -> Self {
        Self::InvalidInput {
            experiment: None,
            variant: None,
            reason,
        }
    }

    pub(crate) fn invalid_variant(variant: &str, reason: InvalidInputReason) -> Self {
        Self::InvalidInput {
            experiment: None,
            variant: Some(variant.to_string()),
            reason,
        }
    }

    #[cfg(feature = "serde")]
    pub(crate) fn document(
        page: Option<&str>,
        experiment: Option<&str>,
        source: serde_json::Error,
    ) -> Self {
        Self::Document {
            page: page.map(str::to_string),
            experiment: experiment.map(str::to_string),
            source: Box::new(source),
        }
    }

    pub(crate) fn computation(detail: impl Into<String>) -> Self {
        Self::Computation {
            experiment: None,
            detail: detail.into(),
        }
    }

    /// Attach the experiment name, unless one is already present.
    pub fn in_experiment(mut self, name: &str) -> Self {
        match &mut self {
            Self::InvalidInput { experiment, .. }
            | Self::Computation { experiment, .. }
            | Self::Document { experiment, .. } => {
                if experiment.is_none() {
                    *experiment = Some(name.to_string());
                }
            }
        }
        self
    }

    /// True for [`Error::InvalidInput`].
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// The typed rejection reason, for [`Error::InvalidInput`].
    pub fn reason(&self) -> Option<&InvalidInputReason> {
        match self {
            Self::InvalidInput { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn experiment(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { experiment, .. }
            | Self::Computation { experiment, .. }
            | Self::Document { experiment, .. } => experiment.as_deref(),
        }
    }

    /// Page URL, for errors raised while decoding a page-keyed document.
    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Document { page, .. } => page.as_deref(),
            _ => None,
        }
    }

    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { variant, .. } => variant.as_deref(),
            _ => None,
        }
    }
}
