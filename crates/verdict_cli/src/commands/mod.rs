//! CLI commands.

pub mod list;
pub mod run;
pub mod show;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use verdict_core::{Catalog, Config, RunConfig, VerdictError};

/// Global options shared by every command.
pub struct Options {
    pub config: Option<PathBuf>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Options {
    /// Load the config file and apply command-line overrides.
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).map_err(with_suggestion)?,
            None => Config::discover(Path::new(".")).map_err(with_suggestion)?,
        };
        if let Some(base_url) = &self.base_url {
            config.target.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            config.target.timeout_seconds = timeout;
        }
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Validated run configuration.
    pub fn run_config(&self) -> Result<RunConfig> {
        self.config()?.run_config().map_err(with_suggestion)
    }

    /// Built-in scenarios plus every configured scenario directory.
    pub fn catalog(&self) -> Result<Catalog> {
        let config = self.config()?;
        let mut catalog = Catalog::builtin().context("Failed to load built-in scenarios")?;
        for dir in &config.scenarios.dirs {
            catalog
                .load_dir(dir)
                .map_err(with_suggestion)
                .with_context(|| format!("Failed to load scenarios from {}", dir.display()))?;
        }
        Ok(catalog)
    }
}

/// Attach the error's recovery suggestion, if it has one.
pub fn with_suggestion(err: VerdictError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\nhint: {}", err, hint),
        None => anyhow::Error::new(err),
    }
}
