//! Raw experiment input, as collected from real-user monitoring.
//!
//! Counts are signed so that malformed upstream data (negative views or counts)
//! can be represented and rejected with context instead of failing to decode.

use std::collections::BTreeMap;

/// One variant's raw interaction counts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariantRecord {
    /// Variant name (unique within an experiment).
    pub name: String,
    pub views: i64,
    /// Click counts keyed by UI selector.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clicks: BTreeMap<String, i64>,
    /// Conversion counts keyed by goal.
    #[cfg_attr(feature = "serde", serde(default))]
    pub conversions: BTreeMap<String, i64>,
}

impl VariantRecord {
    /// A variant with `views` and no interactions.
    pub fn new(name: impl Into<String>, views: i64) -> Self {
        Self {
            name: name.into(),
            views,
            clicks: BTreeMap::new(),
            conversions: BTreeMap::new(),
        }
    }

    /// Add `count` clicks on `selector`.
    pub fn with_clicks(mut self, selector: impl Into<String>, count: i64) -> Self {
        *self.clicks.entry(selector.into()).or_insert(0) += count;
        self
    }

    /// Add `count` conversions for `goal`.
    pub fn with_conversions(mut self, goal: impl Into<String>, count: i64) -> Self {
        *self.conversions.entry(goal.into()).or_insert(0) += count;
        self
    }
}

/// One experiment: a name plus its variants in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExperimentRecord {
    #[cfg_attr(feature = "serde", serde(rename = "experiment"))]
    pub name: String,
    pub variants: Vec<VariantRecord>,
}

impl ExperimentRecord {
    pub fn new(name: impl Into<String>, variants: Vec<VariantRecord>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }
}
