//! URL and body templates.
//!
//! A template is plain text with `{name}` placeholders for captured
//! identifiers and `{$builtin}` placeholders for run-scoped values
//! (`$uuid`, `$now`, `$today`, optionally with a `+Nd` / `-Nd` day offset).
//! `{{` and `}}` produce literal braces.

use crate::error::TemplateError;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A run-scoped generated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// One random v4 UUID per scenario run.
    Uuid,
    /// Run start time (RFC 3339, UTC), shifted by a number of days.
    Now {
        /// Day offset
        days: i64,
    },
    /// Run start date (`YYYY-MM-DD`), shifted by a number of days.
    Today {
        /// Day offset
        days: i64,
    },
}

impl Builtin {
    fn parse(raw: &str) -> Result<Self, TemplateError> {
        let unknown = || TemplateError::UnknownBuiltin {
            name: raw.to_string(),
        };
        if raw == "uuid" {
            return Ok(Self::Uuid);
        }
        let (base, offset) = match raw.find(['+', '-']) {
            Some(pos) => (&raw[..pos], Some(&raw[pos..])),
            None => (raw, None),
        };
        let days = match offset {
            None => 0,
            Some(offset) => {
                let digits = offset[1..].strip_suffix('d').ok_or_else(unknown)?;
                let n: i64 = digits.parse().map_err(|_| unknown())?;
                if offset.starts_with('-') {
                    -n
                } else {
                    n
                }
            }
        };
        match base {
            "now" => Ok(Self::Now { days }),
            "today" => Ok(Self::Today { days }),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, days) = match self {
            Self::Uuid => return write!(f, "$uuid"),
            Self::Now { days } => ("now", *days),
            Self::Today { days } => ("today", *days),
        };
        match days {
            0 => write!(f, "${base}"),
            d if d > 0 => write!(f, "${base}+{d}d"),
            d => write!(f, "${base}{d}d"),
        }
    }
}

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text.
    Literal(String),
    /// A captured identifier.
    Capture(String),
    /// A generated value.
    Builtin(Builtin),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(TemplateError::UnmatchedClose {
                        template: source.to_string(),
                    })
                }
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unterminated {
                            template: source.to_string(),
                        });
                    }
                    let inner = inner.trim();
                    if inner.is_empty() || inner == "$" {
                        return Err(TemplateError::EmptyPlaceholder {
                            template: source.to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    match inner.strip_prefix('$') {
                        Some(builtin) => segments.push(Segment::Builtin(Builtin::parse(builtin)?)),
                        None => segments.push(Segment::Capture(inner.to_string())),
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Captured identifiers this template needs, in order of first use.
    pub fn references(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Capture(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// If the whole template is a single placeholder, return it.
    fn sole_placeholder(&self) -> Option<&Segment> {
        match self.segments.as_slice() {
            [segment @ (Segment::Capture(_) | Segment::Builtin(_))] => Some(segment),
            _ => None,
        }
    }

    /// Render into a string.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Capture(name) => out.push_str(&value_to_text(ctx.lookup(name)?)),
                Segment::Builtin(builtin) => out.push_str(&ctx.builtins.render(*builtin)),
            }
        }
        Ok(out)
    }

    /// Render into a JSON value.
    ///
    /// A template that is exactly one capture placeholder yields the captured
    /// value unchanged, so numeric identifiers stay numbers.
    pub fn render_value(&self, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
        match self.sole_placeholder() {
            Some(Segment::Capture(name)) => Ok(ctx.lookup(name)?.clone()),
            _ => self.render(ctx).map(Value::String),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Text form of a JSON value, as interpolated into URLs and shown to users.
///
/// Strings appear without quotes; everything else is compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Values generated once per scenario run.
#[derive(Debug, Clone)]
pub struct Builtins {
    uuid: String,
    started_at: DateTime<Utc>,
}

impl Builtins {
    /// Fresh values for a new run.
    pub fn generate() -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }

    /// Fixed values, for deterministic rendering.
    pub fn fixed(uuid: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid.to_string(),
            started_at,
        }
    }

    fn render(&self, builtin: Builtin) -> String {
        match builtin {
            Builtin::Uuid => self.uuid.clone(),
            Builtin::Now { days } => (self.started_at + ChronoDuration::days(days))
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            Builtin::Today { days } => (self.started_at + ChronoDuration::days(days))
                .format("%Y-%m-%d")
                .to_string(),
        }
    }
}

/// Everything a template can draw from during rendering.
pub struct RenderContext<'a> {
    captures: &'a HashMap<String, Value>,
    builtins: &'a Builtins,
}

impl<'a> RenderContext<'a> {
    /// Bundle captured identifiers and run built-ins.
    pub fn new(captures: &'a HashMap<String, Value>, builtins: &'a Builtins) -> Self {
        Self { captures, builtins }
    }

    fn lookup(&self, name: &str) -> Result<&'a Value, TemplateError> {
        self.captures
            .get(name)
            .ok_or_else(|| TemplateError::Unresolved {
                name: name.to_string(),
            })
    }
}

/// A JSON body whose string leaves are templates.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyTemplate {
    /// Literal JSON (null, bool, number).
    Literal(Value),
    /// Templated string leaf.
    Text(Template),
    /// Array of templates.
    Array(Vec<BodyTemplate>),
    /// Object with templated values (keys are literal).
    Object(Vec<(String, BodyTemplate)>),
}

impl BodyTemplate {
    /// Parse every string leaf of a JSON value as a template.
    pub fn from_value(value: &Value) -> Result<Self, TemplateError> {
        Ok(match value {
            Value::String(s) => Self::Text(Template::parse(s)?),
            Value::Array(items) => Self::Array(
                items
                    .iter()
                    .map(Self::from_value)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_value(v)?)))
                    .collect::<Result<_, TemplateError>>()?,
            ),
            other => Self::Literal(other.clone()),
        })
    }

    /// Captured identifiers referenced anywhere in the body.
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'s>(&'s self, names: &mut Vec<&'s str>) {
        match self {
            Self::Literal(_) => {}
            Self::Text(template) => {
                for name in template.references() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            Self::Array(items) => items.iter().for_each(|item| item.collect_references(names)),
            Self::Object(fields) => fields
                .iter()
                .for_each(|(_, value)| value.collect_references(names)),
        }
    }

    /// Render into concrete JSON.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
        Ok(match self {
            Self::Literal(value) => value.clone(),
            Self::Text(template) => template.render_value(ctx)?,
            Self::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.render(ctx))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Object(fields) => {
                let mut map = serde_json::Map::with_capacity(fields.len());
                for (key, value) in fields {
                    map.insert(key.clone(), value.render(ctx)?);
                }
                Value::Object(map)
            }
        })
    }

    /// The template source as JSON, for display and serialization.
    pub fn to_source_value(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Text(template) => Value::String(template.source().to_string()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_source_value).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_source_value()))
                    .collect(),
            ),
        }
    }
}
