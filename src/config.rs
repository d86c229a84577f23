//! Engine Configuration
//!
//! Configuration types for the hook engine and its logging

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::HookResult;

/// Configuration for a hook [`Registry`](crate::hooks::Registry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base priority for hooks registered without one
    #[serde(default = "default_priority")]
    pub default_priority: i64,

    /// Prefix marking the concrete implementation of a hookable member
    #[serde(default = "default_hookable_prefix")]
    pub hookable_prefix: String,

    /// Class path hooks are registered under
    #[serde(default = "default_path_hook_class")]
    pub path_hook_class: String,

    /// Synthetic method path hooks are registered under
    #[serde(default = "default_path_hook_method")]
    pub path_hook_method: String,

    /// First characters that mark a method spec as a path hook
    #[serde(default = "default_path_delimiters")]
    pub path_delimiters: String,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_priority() -> i64 {
    100
}

fn default_hookable_prefix() -> String {
    "___".to_string()
}

fn default_path_hook_class() -> String {
    "PathRouter".to_string()
}

fn default_path_hook_method() -> String {
    "pathHooks".to_string()
}

fn default_path_delimiters() -> String {
    "/!@#%".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            hookable_prefix: default_hookable_prefix(),
            path_hook_class: default_path_hook_class(),
            path_hook_method: default_path_hook_method(),
            path_delimiters: default_path_delimiters(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> HookResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse from a JSON string
    pub fn from_json(text: &str) -> HookResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Set the default priority
    pub fn with_default_priority(mut self, priority: i64) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set the hookable prefix
    pub fn with_hookable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hookable_prefix = prefix.into();
        self
    }

    /// Set the class and method path hooks register under
    pub fn with_path_hook_target(
        mut self,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.path_hook_class = class.into();
        self.path_hook_method = method.into();
        self
    }

    /// Set logging options
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Whether a method spec names a path hook
    pub fn is_path_spec(&self, spec: &str) -> bool {
        spec.chars()
            .next()
            .map(|c| self.path_delimiters.contains(c))
            .unwrap_or(false)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Also write daily-rolling log files here
    pub directory: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            directory: None,
        }
    }
}

impl LoggingConfig {
    /// Set the level filter
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Toggle JSON output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Write log files to a directory
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_priority, 100);
        assert_eq!(config.hookable_prefix, "___");
        assert_eq!(config.path_hook_method, "pathHooks");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_json() {
        let config =
            EngineConfig::from_json(r#"{ "default_priority": 10, "logging": { "json": true } }"#)
                .unwrap();
        assert_eq!(config.default_priority, 10);
        assert_eq!(config.hookable_prefix, "___");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "hookable_prefix": "__" }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.hookable_prefix, "__");
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/hookwire.json").unwrap_err();
        assert!(matches!(err, crate::core::HookError::Io(_)));
    }

    #[test]
    fn test_is_path_spec() {
        let config = EngineConfig::default();
        assert!(config.is_path_spec("/foo/{id}/"));
        assert!(config.is_path_spec("!^/api/.*$!"));
        assert!(!config.is_path_spec("Page::render"));
        assert!(!config.is_path_spec(""));
    }
}
