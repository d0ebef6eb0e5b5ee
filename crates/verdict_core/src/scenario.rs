//! Scenario and step definitions.
//!
//! Scenarios are plain data: they can be built with the fluent methods below
//! or deserialized from TOML. Templates inside them are parsed when the
//! scenario is validated and again when a step runs.

use crate::error::{Result, VerdictError};
use crate::template::{BodyTemplate, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// HTTP methods a step can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_expect_status() -> Vec<u16> {
    vec![200]
}

fn default_cleanup_status() -> Vec<u16> {
    vec![200, 204]
}

fn default_cleanup_method() -> Method {
    Method::Delete
}

/// Request issued on behalf of a created resource once the scenario ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupSpec {
    /// Method, `DELETE` unless stated otherwise.
    #[serde(default = "default_cleanup_method")]
    pub method: Method,

    /// URL template; may reference identifiers captured by the creating step.
    pub path: String,

    /// Accepted statuses (default: 200, 204).
    #[serde(default = "default_cleanup_status")]
    pub expect_status: Vec<u16>,
}

/// Shorthand constructors for [`CleanupSpec`].
pub struct Cleanup;

impl Cleanup {
    /// `DELETE path`, accepting 200 or 204.
    pub fn delete(path: &str) -> CleanupSpec {
        CleanupSpec {
            method: Method::Delete,
            path: path.to_string(),
            expect_status: default_cleanup_status(),
        }
    }
}

impl CleanupSpec {
    /// Replace the accepted status set.
    pub fn expect_any_status(mut self, codes: &[u16]) -> Self {
        self.expect_status = codes.to_vec();
        self
    }
}

/// What a field check asserts.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckRule {
    /// The field exists.
    Present,
    /// The field equals the rendered value (may reference captures).
    Equals(Value),
    /// The field equals one of the values; strings compare case-insensitively.
    OneOf(Vec<Value>),
}

/// An assertion on one response field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldCheck", into = "RawFieldCheck")]
pub struct FieldCheck {
    /// Dotted field path.
    pub field: String,
    /// Assertion.
    pub rule: CheckRule,
    /// Skip the check when the field is absent.
    pub optional: bool,
}

impl FieldCheck {
    /// Field must exist.
    pub fn present(field: &str) -> Self {
        Self {
            field: field.to_string(),
            rule: CheckRule::Present,
            optional: false,
        }
    }

    /// Field must equal `value`.
    pub fn equals(field: &str, value: Value) -> Self {
        Self {
            field: field.to_string(),
            rule: CheckRule::Equals(value),
            optional: false,
        }
    }

    /// Field must equal one of `values`.
    pub fn one_of(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            rule: CheckRule::OneOf(values),
            optional: false,
        }
    }

    /// Only check when the field is present.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldCheck {
    field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    optional: bool,
}

impl TryFrom<RawFieldCheck> for FieldCheck {
    type Error = String;

    fn try_from(raw: RawFieldCheck) -> std::result::Result<Self, Self::Error> {
        let rule = match (raw.equals, raw.one_of) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "check on '{}' sets both 'equals' and 'one_of'",
                    raw.field
                ))
            }
            (Some(value), None) => CheckRule::Equals(value),
            (None, Some(values)) => CheckRule::OneOf(values),
            (None, None) => CheckRule::Present,
        };
        Ok(Self {
            field: raw.field,
            rule,
            optional: raw.optional,
        })
    }
}

impl From<FieldCheck> for RawFieldCheck {
    fn from(check: FieldCheck) -> Self {
        let (equals, one_of) = match check.rule {
            CheckRule::Present => (None, None),
            CheckRule::Equals(value) => (Some(value), None),
            CheckRule::OneOf(values) => (None, Some(values)),
        };
        Self {
            field: check.field,
            equals,
            one_of,
            optional: check.optional,
        }
    }
}

/// A single HTTP exchange in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Human label; defaults to `METHOD path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub method: Method,

    /// URL template, relative to the base URL unless absolute.
    pub path: String,

    /// JSON body template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Extra request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Accepted statuses (default: 200).
    #[serde(default = "default_expect_status")]
    pub expect_status: Vec<u16>,

    /// Identifier name -> response field path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captures: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<FieldCheck>,

    /// Present when the step creates a resource that must be removed afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupSpec>,
}

impl Step {
    /// Create a step expecting 200.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            name: None,
            method,
            path: path.to_string(),
            body: None,
            headers: BTreeMap::new(),
            expect_status: default_expect_status(),
            captures: BTreeMap::new(),
            checks: Vec::new(),
            cleanup: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Set the human label.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set the JSON body template.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a request header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Expect exactly this status.
    pub fn expect_status(mut self, code: u16) -> Self {
        self.expect_status = vec![code];
        self
    }

    /// Expect any of these statuses.
    pub fn expect_any_status(mut self, codes: &[u16]) -> Self {
        self.expect_status = codes.to_vec();
        self
    }

    /// Capture `field` from the response as `name`.
    pub fn capture(mut self, name: &str, field: &str) -> Self {
        self.captures.insert(name.to_string(), field.to_string());
        self
    }

    /// Add a field check.
    pub fn check(mut self, check: FieldCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Mark as resource-creating with the given cleanup.
    pub fn creates(mut self, cleanup: CleanupSpec) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Display label.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }

    pub fn is_resource_creating(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Whether the response body must be parsed.
    pub fn needs_body(&self) -> bool {
        !self.captures.is_empty() || !self.checks.is_empty()
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Create an empty scenario.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            steps: Vec::new(),
        }
    }

    /// Set the description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse a scenario from TOML text. `origin` is only used in error messages.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let scenario: Scenario =
            toml::from_str(content).map_err(|e| VerdictError::ScenarioParse {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content, path)
    }

    /// Number of resource-creating steps.
    pub fn creating_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_resource_creating()).count()
    }

    /// Structural validation: names, status sets, and template syntax.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| VerdictError::InvalidScenario {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("scenario name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(invalid("scenario has no steps".into()));
        }

        for (i, step) in self.steps.iter().enumerate() {
            let at = |what: String| invalid(format!("step {} ({}): {}", i, step.label(), what));

            check_status_set(&step.expect_status).map_err(at)?;
            Template::parse(&step.path).map_err(|e| at(e.to_string()))?;
            if let Some(body) = &step.body {
                BodyTemplate::from_value(body).map_err(|e| at(e.to_string()))?;
            }
            for (name, field) in &step.captures {
                if !is_identifier(name) {
                    return Err(at(format!("invalid capture name '{}'", name)));
                }
                if field.trim().is_empty() {
                    return Err(at(format!("capture '{}' has an empty field path", name)));
                }
            }
            for check in &step.checks {
                if check.field.trim().is_empty() {
                    return Err(at("field check has an empty field path".into()));
                }
                if let CheckRule::Equals(value) = &check.rule {
                    BodyTemplate::from_value(value).map_err(|e| at(e.to_string()))?;
                }
            }
            if let Some(cleanup) = &step.cleanup {
                check_status_set(&cleanup.expect_status).map_err(at)?;
                Template::parse(&cleanup.path).map_err(|e| at(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// References that no earlier step captures, as `(step index, name)`.
    ///
    /// A cleanup template may also use identifiers captured by its own step.
    /// Unparseable templates are skipped; [`Scenario::validate`] reports them.
    pub fn unresolved_references(&self) -> Vec<(usize, String)> {
        let mut known: HashSet<&str> = HashSet::new();
        let mut missing = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            let mut request_refs: Vec<String> = Vec::new();
            if let Ok(t) = Template::parse(&step.path) {
                request_refs.extend(t.references().into_iter().map(str::to_string));
            }
            if let Some(Ok(body)) = step.body.as_ref().map(BodyTemplate::from_value) {
                request_refs.extend(body.references().into_iter().map(str::to_string));
            }
            for name in request_refs {
                if !known.contains(name.as_str()) && !missing.contains(&(i, name.clone())) {
                    missing.push((i, name));
                }
            }

            known.extend(step.captures.keys().map(String::as_str));

            let mut late_refs: Vec<String> = Vec::new();
            for check in &step.checks {
                if let CheckRule::Equals(value) = &check.rule {
                    if let Ok(t) = BodyTemplate::from_value(value) {
                        late_refs.extend(t.references().into_iter().map(str::to_string));
                    }
                }
            }
            if let Some(Ok(t)) = step.cleanup.as_ref().map(|c| Template::parse(&c.path)) {
                late_refs.extend(t.references().into_iter().map(str::to_string));
            }
            for name in late_refs {
                if !known.contains(name.as_str()) && !missing.contains(&(i, name.clone())) {
                    missing.push((i, name));
                }
            }
        }
        missing
    }
}

fn check_status_set(codes: &[u16]) -> std::result::Result<(), String> {
    if codes.is_empty() {
        return Err("expected status set is empty".into());
    }
    if let Some(code) = codes.iter().find(|c| !(100..=599).contains(*c)) {
        return Err(format!("{} is not an HTTP status code", code));
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('$')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Resolve a dotted field path (`data.items.0.id`) against a JSON value.
///
/// Numeric segments index arrays; every other segment is an object key.
pub fn lookup_field<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
