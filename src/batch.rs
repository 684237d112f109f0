//! Running many experiments at once.
//!
//! Each experiment is computed independently: one malformed experiment yields an
//! `Err` in its own outcome and leaves every other outcome untouched.

use crate::error::Result;
use crate::{compute_allocation_with, AllocationConfig, AllocationWeights, ExperimentRecord};

/// An experiment together with the page it was observed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExperiment {
    /// Page URL, when the input was grouped by page.
    pub page: Option<String>,
    pub experiment: ExperimentRecord,
}

impl From<ExperimentRecord> for PageExperiment {
    fn from(experiment: ExperimentRecord) -> Self {
        Self {
            page: None,
            experiment,
        }
    }
}

/// Result of one experiment in a batch.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub page: Option<String>,
    pub experiment: String,
    pub result: Result<AllocationWeights>,
}

impl ExperimentOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn log_failure(outcome: &ExperimentOutcome) {
    if let Err(err) = &outcome.result {
        tracing::warn!(
            page = outcome.page.as_deref().unwrap_or(""),
            experiment = %outcome.experiment,
            error = %err,
            "skipping experiment"
        );
    }
}

fn compute_one(pe: &PageExperiment, cfg: &AllocationConfig) -> ExperimentOutcome {
    let outcome = ExperimentOutcome {
        page: pe.page.clone(),
        experiment: pe.experiment.name.clone(),
        result: compute_allocation_with(&pe.experiment, cfg),
    };
    log_failure(&outcome);
    outcome
}

/// Compute allocations for every experiment, isolating failures.
///
/// Outcomes are returned in input order.
pub fn compute_batch(
    experiments: &[PageExperiment],
    cfg: &AllocationConfig,
) -> Vec<ExperimentOutcome> {
    experiments.iter().map(|pe| compute_one(pe, cfg)).collect()
}

/// Like [`compute_batch`], but entries that already failed upstream (e.g. an
/// experiment that could not be decoded) pass through as failed outcomes.
///
/// A failed entry reports the page and experiment name carried by its error
/// (empty name when the experiment had none).
pub fn compute_batch_entries(
    entries: Vec<Result<PageExperiment>>,
    cfg: &AllocationConfig,
) -> Vec<ExperimentOutcome> {
    entries
        .into_iter()
        .map(|entry| match entry {
            Ok(pe) => compute_one(&pe, cfg),
            Err(err) => {
                let outcome = ExperimentOutcome {
                    page: err.page().map(str::to_string),
                    experiment: err.experiment().unwrap_or_default().to_string(),
                    result: Err(err),
                };
                log_failure(&outcome);
                outcome
            }
        })
        .collect()
}
