//! Property protection settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Property protection configuration.
///
/// Protection is enabled only when a protection file is configured.
///
/// # Example (TOML)
///
/// ```toml
/// [property_protection]
/// file = "/etc/service/property-protections.toml"
/// rule_format = "roles"
/// watch = true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Location of the property protection file.
    pub file: Option<PathBuf>,

    /// Whether the file lists `roles` or `policies`.
    /// Validated (case-insensitively) when the rules are compiled.
    pub rule_format: String,

    /// Reload the rules when the protection file changes.
    pub watch: bool,

    /// Quiet period after a file change before reloading.
    pub watch_debounce_ms: u64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            file: None,
            rule_format: "roles".to_string(),
            watch: false,
            watch_debounce_ms: 500,
        }
    }
}

impl ProtectionConfig {
    /// Create a config for the given protection file.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    /// Set the rule format.
    #[must_use]
    pub fn with_rule_format(mut self, rule_format: impl Into<String>) -> Self {
        self.rule_format = rule_format.into();
        self
    }

    /// Returns `true` if a protection file is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|file| !file.as_os_str().is_empty())
    }

    /// Debounce period for the file watcher.
    #[must_use]
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
