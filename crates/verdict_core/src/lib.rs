//! Verdict Core Library
//!
//! An API-contract scenario runner, providing:
//! - Declarative scenarios of HTTP steps (fluent builder or TOML)
//! - Identifier capture and templating between steps
//! - Status and field assertions with precise failure context
//! - Guaranteed, best-effort cleanup of created resources
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use serde_json::json;
//! use verdict_core::{Cleanup, RunConfig, Scenario, Step};
//!
//! let scenario = Scenario::new("exam_roundtrip")
//!     .step(
//!         Step::post("/api/Exam")
//!             .json(json!({"dept_id": 1, "assessment_type": "Midterm"}))
//!             .expect_status(201)
//!             .capture("exam_id", "exam_id")
//!             .creates(Cleanup::delete("/api/Exam/{exam_id}")),
//!     )
//!     .step(Step::get("/api/Exam/{exam_id}"));
//!
//! let config = RunConfig::new("http://localhost:5000", Duration::from_secs(30)).unwrap();
//! let report = verdict_core::run(&scenario, &config).unwrap();
//! println!("{}", report.summary());
//! ```
//!
//! # Templates
//!
//! Paths, body strings, expected check values, and cleanup paths may
//! reference captured identifiers:
//!
//! ```
//! use std::collections::HashMap;
//! use serde_json::json;
//! use verdict_core::{Builtins, RenderContext, Template};
//!
//! let mut captures = HashMap::new();
//! captures.insert("student_id".to_string(), json!(42));
//! let builtins = Builtins::generate();
//! let ctx = RenderContext::new(&captures, &builtins);
//!
//! let template = Template::parse("/api/Student/{student_id}").unwrap();
//! assert_eq!(template.render(&ctx).unwrap(), "/api/Student/42");
//! ```

mod catalog;
mod config;
mod error;
mod http;
mod report;
mod runner;
mod scenario;
mod template;

pub use catalog::Catalog;
pub use config::{
    Config, RunConfig, ScenariosConfig, TargetConfig, CONFIG_FILE_NAME, DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use error::{CleanupError, Result, StepFailure, TemplateError, VerdictError};
pub use http::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};
pub use report::{CleanupRecord, CleanupReport, FailedStep, ScenarioReport, StepRecord};
pub use runner::ScenarioRunner;
pub use scenario::{lookup_field, CheckRule, Cleanup, CleanupSpec, FieldCheck, Method, Scenario, Step};
pub use template::{
    value_to_text, BodyTemplate, Builtin, Builtins, RenderContext, Segment, Template,
};

/// Run one scenario over HTTP with the given configuration.
///
/// Fails only when the HTTP client cannot be built; scenario failures are
/// reported inside the returned [`ScenarioReport`].
pub fn run(scenario: &Scenario, config: &RunConfig) -> Result<ScenarioReport> {
    let transport = HttpTransport::new(config)?;
    Ok(ScenarioRunner::new(transport, config.clone()).run(scenario))
}
