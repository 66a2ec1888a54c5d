//! Master configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! seed_file = "seed.yaml"
//! failure_timeout_secs = 120
//!
//! [log]
//! level = "info,chaos_controller=debug"
//! format = "json"
//!
//! [controller]
//! workers = 2
//! agents = true
//! ```

use crate::error::ControllerError;
use chaos_core::{FailureDefinition, FailureSpec, SharedObject, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Concurrent workers of the experiment controller
    pub workers: usize,
    /// Run a failure agent for every seeded node
    pub agents: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            agents: true,
        }
    }
}

/// Configuration of the `chaos-master` process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Logging
    pub log: LogConfig,
    /// Controllers
    pub controller: ControllerConfig,
    /// YAML or JSON list of resources loaded at startup
    pub seed_file: Option<PathBuf>,
    /// Timeout given to failure templates that do not set one
    pub failure_timeout_secs: u64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            controller: ControllerConfig::default(),
            seed_file: None,
            failure_timeout_secs: 300,
        }
    }
}

impl MasterConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a number of experiment workers
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.controller.workers = workers;
        self
    }

    /// With or without failure agents
    #[inline]
    #[must_use]
    pub fn with_agents(mut self, agents: bool) -> Self {
        self.controller.agents = agents;
        self
    }

    /// With a seed file
    #[inline]
    #[must_use]
    pub fn with_seed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_file = Some(path.into());
        self
    }

    /// With a log filter
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log.level = level.into();
        self
    }

    /// Default failure timeout
    #[inline]
    #[must_use]
    pub fn failure_timeout(&self) -> Duration {
        Duration::from_secs(self.failure_timeout_secs)
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns `ControllerError::Config` if the source is invalid.
    pub fn from_toml_str(source: &str) -> Result<Self, ControllerError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ControllerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns `ControllerError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ControllerError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Check field ranges
    ///
    /// # Errors
    /// Returns `ControllerError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.controller.workers == 0 {
            return Err(ControllerError::Config(
                "controller.workers must be at least 1".to_string(),
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(ControllerError::Config("log.level must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply the default timeout to a template without one
    #[must_use]
    pub fn complete_template(&self, mut spec: FailureSpec) -> FailureSpec {
        if spec.timeout.is_zero() {
            spec.timeout = self.failure_timeout();
        }
        spec
    }

    /// Render a YAML failure definition, completed with this configuration
    ///
    /// # Errors
    /// Returns `ControllerError::Object` if the definition is malformed.
    pub fn render_definition(&self, source: &str) -> Result<FailureSpec, ControllerError> {
        let spec = FailureDefinition::from_yaml(source)?.render()?;
        Ok(self.complete_template(spec))
    }
}

/// Decode a seed file: `.json` as JSON, anything else as YAML
///
/// # Errors
/// Returns `ControllerError::Config` if the file cannot be read and
/// `ControllerError::Object` if it cannot be decoded.
pub fn load_seed(path: &Path, registry: &TypeRegistry) -> Result<Vec<SharedObject>, ControllerError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| ControllerError::Config(format!("cannot read {}: {e}", path.display())))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let objects = if is_json {
        let value: serde_json::Value =
            serde_json::from_str(&source).map_err(chaos_core::ObjectError::from)?;
        registry.decode_list(value)?
    } else {
        registry.decode_yaml_list(&source)?
    };
    Ok(objects)
}
