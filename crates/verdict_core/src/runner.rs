//! Scenario execution.
//!
//! Steps run strictly in order, each exactly once. The first violated
//! expectation stops the body of the scenario; registered cleanup actions
//! then run in reverse registration order no matter how the body ended.

use crate::config::RunConfig;
use crate::error::{CleanupError, StepFailure};
use crate::http::{HttpRequest, Transport};
use crate::report::{CleanupRecord, CleanupReport, FailedStep, ScenarioReport, StepRecord};
use crate::scenario::{lookup_field, CheckRule, FieldCheck, Method, Scenario, Step};
use crate::template::{BodyTemplate, Builtins, RenderContext, Template};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A delete (or other call) owed to the server for a created resource.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CleanupAction {
    step_index: usize,
    method: Method,
    url: String,
    expect_status: Vec<u16>,
}

/// State private to one scenario execution.
struct Execution {
    captures: HashMap<String, Value>,
    builtins: Builtins,
    cleanup: Vec<CleanupAction>,
    steps: Vec<StepRecord>,
}

/// Runs scenarios against one server.
pub struct ScenarioRunner<T: Transport> {
    transport: T,
    config: RunConfig,
    builtins: Option<Builtins>,
}

impl<T: Transport> ScenarioRunner<T> {
    pub fn new(transport: T, config: RunConfig) -> Self {
        Self {
            transport,
            config,
            builtins: None,
        }
    }

    /// Use fixed built-in values instead of generating them per run.
    pub fn with_builtins(mut self, builtins: Builtins) -> Self {
        self.builtins = Some(builtins);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute a scenario end-to-end.
    pub fn run(&self, scenario: &Scenario) -> ScenarioReport {
        self.run_with_progress(scenario, &|_, _, _| {})
    }

    /// Execute a scenario, reporting `(current, total, label)` before each
    /// step and each cleanup action.
    pub fn run_with_progress(
        &self,
        scenario: &Scenario,
        progress: &dyn Fn(usize, usize, &str),
    ) -> ScenarioReport {
        let started = Instant::now();
        let mut exec = Execution {
            captures: HashMap::new(),
            builtins: self.builtins.clone().unwrap_or_else(Builtins::generate),
            cleanup: Vec::new(),
            steps: Vec::new(),
        };

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "starting scenario");

        let total = scenario.steps.len();
        let mut failure = None;
        for (index, step) in scenario.steps.iter().enumerate() {
            let label = step.label();
            progress(index, total, &label);
            if let Err(err) = self.execute_step(&mut exec, &scenario.name, index, step) {
                warn!(scenario = %scenario.name, step = index, error = %err, "step failed");
                failure = Some(FailedStep {
                    index,
                    label,
                    failure: err,
                });
                break;
            }
        }

        let cleanup = self.run_cleanup(&mut exec, &scenario.name, progress);

        let report = ScenarioReport {
            name: scenario.name.clone(),
            steps_total: total,
            steps: exec.steps,
            failure,
            cleanup,
            captures: exec.captures.into_iter().collect(),
            elapsed: started.elapsed(),
        };
        if report.passed() {
            info!(scenario = %report.name, elapsed_ms = report.elapsed.as_millis() as u64, "scenario passed");
        } else {
            warn!(scenario = %report.name, "{}", report.summary());
        }
        report
    }

    fn execute_step(
        &self,
        exec: &mut Execution,
        scenario: &str,
        index: usize,
        step: &Step,
    ) -> Result<(), StepFailure> {
        let path = Template::parse(&step.path)?;
        let body = step
            .body
            .as_ref()
            .map(BodyTemplate::from_value)
            .transpose()?;
        let cleanup_path = step
            .cleanup
            .as_ref()
            .map(|c| Template::parse(&c.path))
            .transpose()?;
        let check_values = step
            .checks
            .iter()
            .map(|check| match &check.rule {
                CheckRule::Equals(value) => BodyTemplate::from_value(value).map(Some),
                _ => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Everything the request needs must already be captured; templates
        // evaluated after the response may also use this step's captures.
        let unresolved = |name: &str, location: &str, late: bool| {
            let known =
                exec.captures.contains_key(name) || (late && step.captures.contains_key(name));
            if known {
                Ok(())
            } else {
                Err(StepFailure::UnresolvedReference {
                    name: name.to_string(),
                    location: location.to_string(),
                })
            }
        };
        for name in path.references() {
            unresolved(name, "url", false)?;
        }
        if let Some(body) = &body {
            for name in body.references() {
                unresolved(name, "body", false)?;
            }
        }
        for template in check_values.iter().flatten() {
            for name in template.references() {
                unresolved(name, "check", true)?;
            }
        }
        if let Some(cleanup_path) = &cleanup_path {
            for name in cleanup_path.references() {
                unresolved(name, "cleanup", true)?;
            }
        }

        let ctx = RenderContext::new(&exec.captures, &exec.builtins);
        let url = self.config.url_for(&path.render(&ctx)?);
        let body = body.map(|b| b.render(&ctx)).transpose()?;

        let mut headers = self.config.headers().to_vec();
        for (name, value) in &step.headers {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        let request = HttpRequest {
            method: step.method,
            url: url.clone(),
            headers,
            body,
        };
        info!(scenario, step = index, method = %step.method, url = %url, "sending request");

        let method = step.method.to_string();
        let response = self.transport.send(&request);
        exec.steps.push(StepRecord {
            index,
            label: step.label(),
            method: step.method,
            url: url.clone(),
            status: response.as_ref().ok().map(|r| r.status),
        });
        let response = response.map_err(|e| StepFailure::Transport {
            method: method.clone(),
            url: url.clone(),
            reason: e.message,
            timed_out: e.timed_out,
        })?;
        debug!(status = response.status, bytes = response.body.len(), "response received");

        if !step.expect_status.contains(&response.status) {
            return Err(StepFailure::UnexpectedStatus {
                method,
                url,
                expected: step.expect_status.clone(),
                observed: response.status,
                body: response.body,
            });
        }

        // The server accepted the request, so anything it created is owed a
        // cleanup from here on, even if the rest of the step fails.
        let parsed = if step.needs_body() {
            serde_json::from_str::<Value>(&response.body)
                .map(Some)
                .map_err(|e| StepFailure::MalformedResponse {
                    method: method.clone(),
                    url: url.clone(),
                    reason: e.to_string(),
                    body: response.body.clone(),
                })
        } else {
            Ok(None)
        };

        let mut missing = None;
        if let Ok(Some(body)) = &parsed {
            for (name, field) in &step.captures {
                match lookup_field(body, field) {
                    Some(value) if !value.is_null() => {
                        debug!(name = %name, value = %value, "captured identifier");
                        exec.captures.insert(name.clone(), value.clone());
                    }
                    _ => {
                        missing.get_or_insert_with(|| field.clone());
                    }
                }
            }
        }

        if let (Some(spec), Some(template)) = (&step.cleanup, &cleanup_path) {
            let resolvable = template
                .references()
                .into_iter()
                .all(|name| exec.captures.contains_key(name));
            if resolvable {
                let ctx = RenderContext::new(&exec.captures, &exec.builtins);
                let cleanup_url = self.config.url_for(&template.render(&ctx)?);
                debug!(method = %spec.method, url = %cleanup_url, "registered cleanup");
                exec.cleanup.push(CleanupAction {
                    step_index: index,
                    method: spec.method,
                    url: cleanup_url,
                    expect_status: spec.expect_status.clone(),
                });
            } else {
                warn!(scenario, step = index, "created resource has no identifier to clean up with");
            }
        }

        let Some(parsed) = parsed? else {
            return Ok(());
        };
        if let Some(field) = missing {
            return Err(StepFailure::MissingField { method, url, field });
        }

        let ctx = RenderContext::new(&exec.captures, &exec.builtins);
        for (check, template) in step.checks.iter().zip(&check_values) {
            let expected = template.as_ref().map(|t| t.render(&ctx)).transpose()?;
            evaluate_check(check, expected.as_ref(), &parsed)
                .map_err(|e| e.into_failure(&method, &url, &check.field))?;
        }

        Ok(())
    }

    fn run_cleanup(
        &self,
        exec: &mut Execution,
        scenario: &str,
        progress: &dyn Fn(usize, usize, &str),
    ) -> CleanupReport {
        let total = exec.cleanup.len();
        let mut report = CleanupReport::default();

        let mut n = 0;
        while let Some(action) = exec.cleanup.pop() {
            progress(n, total, &format!("cleanup {} {}", action.method, action.url));
            n += 1;

            let request = HttpRequest {
                method: action.method,
                url: action.url.clone(),
                headers: self.config.headers().to_vec(),
                body: None,
            };
            let result = match self.transport.send(&request) {
                Ok(response) if action.expect_status.contains(&response.status) => {
                    Ok(response.status)
                }
                Ok(response) => Err(CleanupError::UnexpectedStatus {
                    expected: action.expect_status.clone(),
                    observed: response.status,
                }),
                Err(e) => Err(CleanupError::Transport(e.message)),
            };

            match &result {
                Ok(status) => {
                    debug!(scenario, method = %action.method, url = %action.url, status, "cleanup done")
                }
                Err(err) => {
                    warn!(scenario, method = %action.method, url = %action.url, error = %err, "cleanup failed")
                }
            }

            report.records.push(CleanupRecord {
                step_index: action.step_index,
                method: action.method,
                url: action.url,
                result,
            });
        }
        report
    }
}

enum CheckError {
    Missing,
    Mismatch { expected: String, actual: String },
}

impl CheckError {
    fn into_failure(self, method: &str, url: &str, field: &str) -> StepFailure {
        match self {
            Self::Missing => StepFailure::MissingField {
                method: method.to_string(),
                url: url.to_string(),
                field: field.to_string(),
            },
            Self::Mismatch { expected, actual } => StepFailure::FieldMismatch {
                method: method.to_string(),
                url: url.to_string(),
                field: field.to_string(),
                expected,
                actual,
            },
        }
    }
}

fn evaluate_check(
    check: &FieldCheck,
    rendered: Option<&Value>,
    body: &Value,
) -> Result<(), CheckError> {
    let actual = match lookup_field(body, &check.field) {
        Some(value) => value,
        None if check.optional => return Ok(()),
        None => return Err(CheckError::Missing),
    };

    match (&check.rule, rendered) {
        (CheckRule::Present, _) => Ok(()),
        (CheckRule::Equals(_), Some(expected)) => {
            if values_match(expected, actual, false) {
                Ok(())
            } else {
                Err(CheckError::Mismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                })
            }
        }
        (CheckRule::Equals(raw), None) => Err(CheckError::Mismatch {
            expected: raw.to_string(),
            actual: actual.to_string(),
        }),
        (CheckRule::OneOf(values), _) => {
            if values.iter().any(|v| values_match(v, actual, true)) {
                Ok(())
            } else {
                Err(CheckError::Mismatch {
                    expected: format!(
                        "one of [{}]",
                        values.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
                    ),
                    actual: actual.to_string(),
                })
            }
        }
    }
}

/// Loose JSON equality: numbers compare numerically and a numeric string
/// equals the same number.
fn values_match(expected: &Value, actual: &Value, ignore_case: bool) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_match(a, b),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim()
                .parse::<Number>()
                .is_ok_and(|parsed| numbers_match(&parsed, n))
        }
        (Value::String(a), Value::String(b)) if ignore_case => a.to_lowercase() == b.to_lowercase(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| values_match(x, y, ignore_case))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, x)| {
                    b.get(k)
                        .map_or(false, |y| values_match(x, y, ignore_case))
                })
        }
        _ => expected == actual,
    }
}

/// Integers compare exactly; only non-integers go through `f64`.
fn numbers_match(a: &Number, b: &Number) -> bool {
    match (a.as_i64(), b.as_i64(), a.as_u64(), b.as_u64()) {
        (Some(x), Some(y), _, _) => x == y,
        (_, _, Some(x), Some(y)) => x == y,
        _ if a.is_f64() || b.is_f64() => a.as_f64() == b.as_f64(),
        _ => false,
    }
}
