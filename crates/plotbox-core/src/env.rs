//! Environment variable handling.

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse the raw value of variable `name` into `T`.
///
/// An absent value yields `Ok(None)`; a present value that does not parse is
/// an error rather than being silently ignored.
pub fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: name.to_string(),
                value: raw,
            }),
    }
}

/// Load environment variables from a .env file.
pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = std::path::Path::new(".env");
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                    .unwrap_or(value);

                // Only set if not already set
                if env::var(key).is_err() {
                    env::set_var(key, value);
                }
            }
        }
    }
    Ok(())
}

/// Environment variable names read at startup.
pub mod vars {
    /// Wall-clock timeout for one execution, in seconds.
    pub const EXECUTION_TIMEOUT: &str = "EXECUTION_TIMEOUT";

    /// Address-space ceiling for a worker, in MiB.
    pub const EXECUTION_MEMORY_LIMIT_MB: &str = "EXECUTION_MEMORY_LIMIT_MB";

    /// Open file descriptor ceiling for a worker.
    pub const EXECUTION_MAX_OPEN_FILES: &str = "EXECUTION_MAX_OPEN_FILES";

    /// Minimum spacing between two runs of the same user, in seconds.
    pub const MIN_EXECUTION_INTERVAL_SECONDS: &str = "MIN_EXECUTION_INTERVAL_SECONDS";

    /// CPU seconds a user may consume per window (0 disables the check).
    pub const USER_CPU_BUDGET_SECONDS: &str = "USER_CPU_BUDGET_SECONDS";

    /// Length of the CPU budget window, in seconds.
    pub const USER_CPU_BUDGET_WINDOW_SECONDS: &str = "USER_CPU_BUDGET_WINDOW_SECONDS";

    /// Server bind address.
    pub const PLOTBOX_BIND: &str = "PLOTBOX_BIND";

    /// Server port.
    pub const PLOTBOX_PORT: &str = "PLOTBOX_PORT";

    /// Execution history database URL.
    pub const PLOTBOX_DATABASE: &str = "PLOTBOX_DATABASE";

    /// Worker program override.
    pub const PLOTBOX_WORKER: &str = "PLOTBOX_WORKER";

    /// Config file override.
    pub const PLOTBOX_CONFIG: &str = "PLOTBOX_CONFIG";
}
