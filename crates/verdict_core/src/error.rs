//! Error types for verdict_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for loading, validating and preparing scenario runs.
///
/// Failures that happen *while a scenario runs* are not `VerdictError`s;
/// they are reported as [`StepFailure`] inside the scenario report.
#[derive(Error, Debug)]
pub enum VerdictError {
    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Scenario file could not be parsed.
    #[error("failed to parse scenario {}: {}", path.display(), reason)]
    ScenarioParse {
        /// Path of the scenario file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Scenario definition is structurally invalid.
    #[error("invalid scenario '{name}': {reason}")]
    InvalidScenario {
        /// Scenario name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// No scenario with the given name exists in the catalog.
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerdictError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ScenarioNotFound(_) => {
                Some("Run 'verdict list' to see available scenarios, or pass a path to a .toml file.")
            }
            Self::Config(_) => {
                Some("Check verdict.toml: base_url must start with http:// or https:// and timeout_seconds must be > 0.")
            }
            Self::ScenarioParse { .. } => {
                Some("Run 'verdict show <file>' after fixing the TOML to confirm the steps parse as intended.")
            }
            _ => None,
        }
    }
}

/// Template parsing and rendering failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` without a matching `}`.
    #[error("unterminated placeholder in template {template:?}")]
    Unterminated {
        /// The offending template text
        template: String,
    },

    /// A stray `}` outside any placeholder.
    #[error("unmatched '}}' in template {template:?}")]
    UnmatchedClose {
        /// The offending template text
        template: String,
    },

    /// `{}` or a placeholder with only whitespace.
    #[error("empty placeholder in template {template:?}")]
    EmptyPlaceholder {
        /// The offending template text
        template: String,
    },

    /// `{$something}` that is not a known built-in.
    #[error("unknown built-in '${name}'")]
    UnknownBuiltin {
        /// Built-in name without the `$`
        name: String,
    },

    /// A captured identifier was referenced before any step captured it.
    #[error("unresolved reference '{name}'")]
    Unresolved {
        /// Identifier name
        name: String,
    },
}

/// Why a scenario step failed.
///
/// Every variant is a scenario-level failure: the run stops at the first one
/// and proceeds to cleanup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepFailure {
    /// Connection failure or request timeout.
    #[error("{method} {url}: transport error{}: {reason}", if *timed_out { " (timed out)" } else { "" })]
    Transport {
        /// Request method
        method: String,
        /// Fully rendered URL
        url: String,
        /// Underlying client message
        reason: String,
        /// Whether the per-request deadline elapsed
        timed_out: bool,
    },

    /// Observed status is outside the expected set.
    #[error("{method} {url}: expected status {expected:?}, got {observed}; body: {body}")]
    UnexpectedStatus {
        /// Request method
        method: String,
        /// Fully rendered URL
        url: String,
        /// Accepted status codes
        expected: Vec<u16>,
        /// Status returned by the server
        observed: u16,
        /// Raw response body
        body: String,
    },

    /// A declared field is absent from the response body.
    #[error("{method} {url}: response is missing field '{field}'")]
    MissingField {
        /// Request method
        method: String,
        /// Fully rendered URL
        url: String,
        /// Field path that was looked up
        field: String,
    },

    /// The response body is not valid JSON.
    #[error("{method} {url}: malformed response body ({reason}): {body}")]
    MalformedResponse {
        /// Request method
        method: String,
        /// Fully rendered URL
        url: String,
        /// Parser message
        reason: String,
        /// Raw response body
        body: String,
    },

    /// A template referenced an identifier that no earlier step captured.
    #[error("unresolved reference '{name}' in {location}")]
    UnresolvedReference {
        /// Identifier name
        name: String,
        /// Which template referenced it (url, body, check, cleanup)
        location: String,
    },

    /// A field check did not hold.
    #[error("{method} {url}: field '{field}' expected {expected}, got {actual}")]
    FieldMismatch {
        /// Request method
        method: String,
        /// Fully rendered URL
        url: String,
        /// Field path
        field: String,
        /// Expected value description
        expected: String,
        /// Observed value
        actual: String,
    },

    /// A template could not be parsed or rendered.
    #[error("invalid template: {0}")]
    InvalidTemplate(TemplateError),
}

impl From<TemplateError> for StepFailure {
    fn from(err: TemplateError) -> Self {
        Self::InvalidTemplate(err)
    }
}

/// Failure of a single cleanup action.
///
/// Cleanup errors are recorded and logged but never change a scenario's verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    /// The delete request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a status outside the accepted set.
    #[error("expected status {expected:?}, got {observed}")]
    UnexpectedStatus {
        /// Accepted status codes
        expected: Vec<u16>,
        /// Status returned by the server
        observed: u16,
    },
}

/// Convenience Result type for verdict_core operations.
pub type Result<T> = std::result::Result<T, VerdictError>;
