//! Named scenario collections.
//!
//! The built-in campus scenarios are embedded at compile time; extra
//! scenarios are loaded from directories of `*.toml` files.

use crate::error::{Result, VerdictError};
use crate::scenario::Scenario;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_SCENARIOS: &[(&str, &str)] = &[
    (
        "student_registration.toml",
        include_str!("../scenarios/student_registration.toml"),
    ),
    (
        "library_circulation.toml",
        include_str!("../scenarios/library_circulation.toml"),
    ),
    (
        "hostel_allocation.toml",
        include_str!("../scenarios/hostel_allocation.toml"),
    ),
    (
        "exam_lifecycle.toml",
        include_str!("../scenarios/exam_lifecycle.toml"),
    ),
    (
        "fee_payment.toml",
        include_str!("../scenarios/fee_payment.toml"),
    ),
    (
        "role_access.toml",
        include_str!("../scenarios/role_access.toml"),
    ),
    (
        "dashboard_health.toml",
        include_str!("../scenarios/dashboard_health.toml"),
    ),
];

/// Scenarios indexed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenarios: BTreeMap<String, Scenario>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded campus scenarios.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::new();
        for (file, content) in BUILTIN_SCENARIOS {
            let scenario = Scenario::from_toml_str(content, Path::new(file))?;
            catalog.insert(scenario);
        }
        Ok(catalog)
    }

    /// Add every `*.toml` scenario in `dir`. Returns how many were loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let scenario = Scenario::load(path)?;
            debug!(name = %scenario.name, path = %path.display(), "loaded scenario");
            self.insert(scenario);
        }
        Ok(paths.len())
    }

    /// Add a scenario, replacing any scenario with the same name.
    pub fn insert(&mut self, scenario: Scenario) -> Option<Scenario> {
        let previous = self.scenarios.insert(scenario.name.clone(), scenario);
        if let Some(previous) = &previous {
            warn!(name = %previous.name, "scenario replaced by a later definition");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.get(name)
    }

    /// Look up by name, or load from a path when `name_or_path` points at a file.
    pub fn resolve(&self, name_or_path: &str) -> Result<Scenario> {
        if let Some(scenario) = self.get(name_or_path) {
            return Ok(scenario.clone());
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return Scenario::load(path);
        }
        Err(VerdictError::ScenarioNotFound(name_or_path.to_string()))
    }

    /// Scenarios in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
