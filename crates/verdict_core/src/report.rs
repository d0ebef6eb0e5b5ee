//! Results of a scenario run.

use crate::error::{CleanupError, StepFailure};
use crate::scenario::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// One request the runner actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Index of the step in the scenario.
    pub index: usize,
    pub label: String,
    pub method: Method,
    pub url: String,
    /// Status returned, if a response arrived.
    pub status: Option<u16>,
}

/// The first violated expectation of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedStep {
    pub index: usize,
    pub label: String,
    pub failure: StepFailure,
}

/// Outcome of one cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRecord {
    /// Index of the step that registered the action.
    pub step_index: usize,
    pub method: Method,
    pub url: String,
    /// Observed status on success.
    pub result: Result<u16, CleanupError>,
}

/// Every cleanup action attempted, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub records: Vec<CleanupRecord>,
}

impl CleanupReport {
    /// Number of actions attempted.
    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    /// Records whose action failed.
    pub fn failures(&self) -> impl Iterator<Item = &CleanupRecord> {
        self.records.iter().filter(|r| r.result.is_err())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Result of running one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub name: String,
    /// Steps defined in the scenario.
    pub steps_total: usize,
    /// Requests sent, in order.
    pub steps: Vec<StepRecord>,
    /// Set when the scenario failed.
    pub failure: Option<FailedStep>,
    pub cleanup: CleanupReport,
    /// Identifiers captured by the time the run stopped.
    pub captures: BTreeMap<String, Value>,
    pub elapsed: Duration,
}

impl ScenarioReport {
    /// True when every step met its expectations. Cleanup does not affect this.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Steps that ran to completion or failed (the failing step counts).
    pub fn steps_executed(&self) -> usize {
        match &self.failure {
            Some(failed) => failed.index + 1,
            None => self.steps_total,
        }
    }

    /// One-line verdict.
    pub fn summary(&self) -> String {
        let mut line = match &self.failure {
            None => format!(
                "Scenario '{}' passed ({} steps)",
                self.name, self.steps_total
            ),
            Some(failed) => format!(
                "Scenario '{}' failed at step {} ({}): {}",
                self.name, failed.index, failed.label, failed.failure
            ),
        };
        let cleanup_failures = self.cleanup.failures().count();
        if cleanup_failures > 0 {
            line.push_str(&format!(
                "; {} of {} cleanup actions failed",
                cleanup_failures,
                self.cleanup.attempted()
            ));
        }
        line
    }
}
