//! Configuration loading and persistence.

use super::Config;
use crate::env::{self, vars};
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Build the startup configuration.
    ///
    /// Layers, lowest priority first: built-in defaults, the optional config
    /// file, then environment variables. The result is validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::load(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(env::get_var)
    }

    /// Override fields from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env::parse_var(vars::EXECUTION_TIMEOUT, lookup(vars::EXECUTION_TIMEOUT))? {
            self.execution.timeout_seconds = v;
        }
        if let Some(v) = env::parse_var(vars::EXECUTION_MEMORY_LIMIT_MB, lookup(vars::EXECUTION_MEMORY_LIMIT_MB))? {
            self.execution.memory_limit_mb = v;
        }
        if let Some(v) = env::parse_var(vars::EXECUTION_MAX_OPEN_FILES, lookup(vars::EXECUTION_MAX_OPEN_FILES))? {
            self.execution.max_open_files = v;
        }
        if let Some(program) = lookup(vars::PLOTBOX_WORKER) {
            self.execution.worker_program = Some(PathBuf::from(program));
        }
        if let Some(v) = env::parse_var(vars::MIN_EXECUTION_INTERVAL_SECONDS, lookup(vars::MIN_EXECUTION_INTERVAL_SECONDS))? {
            self.rate_limit.min_interval_seconds = v;
        }
        if let Some(v) = env::parse_var(vars::USER_CPU_BUDGET_SECONDS, lookup(vars::USER_CPU_BUDGET_SECONDS))? {
            self.rate_limit.cpu_budget_seconds = v;
        }
        if let Some(v) = env::parse_var(vars::USER_CPU_BUDGET_WINDOW_SECONDS, lookup(vars::USER_CPU_BUDGET_WINDOW_SECONDS))? {
            self.rate_limit.cpu_budget_window_seconds = v;
        }
        if let Some(bind) = lookup(vars::PLOTBOX_BIND) {
            self.server.bind = bind;
        }
        if let Some(v) = env::parse_var(vars::PLOTBOX_PORT, lookup(vars::PLOTBOX_PORT))? {
            self.server.port = v;
        }
        if let Some(url) = lookup(vars::PLOTBOX_DATABASE) {
            self.history.database_url = url;
        }

        Ok(())
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Execution ceilings
        let timeout = self.execution.timeout_seconds;
        if timeout.is_nan() || timeout <= 0.0 {
            errors.push(format!(
                "Execution timeout must be positive, got {}",
                timeout
            ));
        }
        if self.execution.memory_limit_mb == 0 {
            errors.push("Execution memory limit cannot be 0".to_string());
        }
        if self.execution.max_open_files == 0 {
            errors.push("Execution open file limit cannot be 0".to_string());
        }

        // 2. Rate limiting windows
        let rate = &self.rate_limit;
        if rate.min_interval_seconds < 0.0 || rate.min_interval_seconds.is_nan() {
            errors.push(format!(
                "Minimum execution interval must not be negative, got {}",
                rate.min_interval_seconds
            ));
        }
        let window = rate.cpu_budget_window_seconds;
        if rate.cpu_budget_seconds > 0.0 && (window.is_nan() || window <= 0.0) {
            errors.push(format!(
                "CPU budget window must be positive when a budget is set, got {}",
                window
            ));
        }

        // 3. Server
        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }
        if self.server.bind.trim().is_empty() {
            errors.push("Server bind address cannot be empty".to_string());
        }

        // 4. History
        if self.history.database_url.trim().is_empty() {
            errors.push("History database URL cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
