//! Configuration types for scenario runs.

use crate::error::{Result, VerdictError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up by [`Config::discover`].
pub const CONFIG_FILE_NAME: &str = "verdict.toml";

/// Default server root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Default per-request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Contents of `verdict.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Server under test.
    #[serde(default)]
    pub target: TargetConfig,

    /// Extra headers sent with every request (including cleanup).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Scenario discovery.
    #[serde(default)]
    pub scenarios: ScenariosConfig,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VerdictError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            VerdictError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load `dir/verdict.toml` if it exists, otherwise defaults.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VerdictError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| VerdictError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Validate into the explicit per-run configuration.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut run = RunConfig::new(
            &self.target.base_url,
            Duration::from_secs(self.target.timeout_seconds),
        )?;
        for (name, value) in &self.headers {
            run = run.with_header(name, value);
        }
        Ok(run)
    }
}

/// Server under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Server root, e.g. `http://localhost:5000` (default).
    pub base_url: String,

    /// Per-request deadline in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Where to find scenario files besides the built-in catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ScenariosConfig {
    /// Directories scanned for `*.toml` scenario files.
    pub dirs: Vec<PathBuf>,
}

/// Validated settings for one scenario run.
///
/// Passed explicitly into every run; there is no process-wide default.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    base_url: String,
    timeout: Duration,
    headers: Vec<(String, String)>,
}

impl RunConfig {
    /// Create a run configuration with the default JSON headers.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(VerdictError::Config(format!(
                "base_url must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        if timeout.is_zero() {
            return Err(VerdictError::Config("timeout must be greater than zero".into()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
        })
    }

    /// Add or replace a default header (names compare case-insensitively).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Join a rendered path onto the base URL. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
