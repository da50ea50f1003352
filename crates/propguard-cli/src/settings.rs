//! CLI settings: TOML file plus `PROPGUARD__*` environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use propguard::ProtectionConfig;
use serde::Deserialize;

use crate::cli::{Cli, Commands};

const DEFAULT_SETTINGS_FILE: &str = "propguard.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub property_protection: ProtectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Command-line flags win over file and environment.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(file) = &cli.file {
            self.property_protection.file = Some(file.clone());
        }
        if let Some(rule_format) = &cli.rule_format {
            self.property_protection.rule_format = rule_format.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if matches!(cli.command, Commands::Watch) {
            self.property_protection.watch = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            anyhow::bail!("logging.level must be one of {valid_levels:?}");
        }
        Ok(())
    }
}

/// Load settings from `path` (or `./propguard.toml` when present) and the
/// environment, e.g. `PROPGUARD__PROPERTY_PROTECTION__RULE_FORMAT=policies`.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            builder = builder.add_source(File::from(p.to_path_buf()).required(true));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("PROPGUARD")
            .try_parsing(true)
            .separator("__"),
    );

    let settings: Settings = builder
        .build()
        .context("failed to read settings")?
        .try_deserialize()
        .context("invalid settings")?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            r#"
[property_protection]
file = "/etc/propguard/protections.toml"
rule_format = "policies"
watch_debounce_ms = 250

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        let protection = &settings.property_protection;
        assert_eq!(
            protection.file.as_deref(),
            Some(Path::new("/etc/propguard/protections.toml"))
        );
        assert_eq!(protection.rule_format, "policies");
        assert_eq!(protection.watch_debounce_ms, 250);
        assert!(!protection.watch);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_missing_explicit_settings_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_invalid_log_level_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(load_settings(Some(&path)).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let cli = Cli::parse_from([
            "propguard",
            "--file",
            "rules.toml",
            "--rule-format",
            "policies",
            "--log-level",
            "info",
            "validate",
        ]);
        let mut settings = Settings::default();
        settings.apply_overrides(&cli);

        assert_eq!(
            settings.property_protection.file.as_deref(),
            Some(Path::new("rules.toml"))
        );
        assert_eq!(settings.property_protection.rule_format, "policies");
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.property_protection.watch);
    }

    #[test]
    fn test_watch_command_enables_watching() {
        let cli = Cli::parse_from(["propguard", "--file", "rules.toml", "watch"]);
        let mut settings = Settings::default();
        settings.apply_overrides(&cli);
        assert!(settings.property_protection.watch);
    }
}
