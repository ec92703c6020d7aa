//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → defaults.

use crate::{EngineSettings, RuleSet};
use kt_common::Result;
use std::path::{Path, PathBuf};

/// Discovered configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to config.toml (or None if not found).
    pub settings: Option<PathBuf>,

    /// Path to rules.json (or None if not found).
    pub rules: Option<PathBuf>,

    /// Source of the settings file (for diagnostics).
    pub settings_source: ConfigSource,

    /// Source of the rule table (for diagnostics).
    pub rules_source: ConfigSource,
}

impl ConfigPaths {
    /// Load the resolved files, falling back to built-ins where absent.
    pub fn load(&self) -> Result<(EngineSettings, RuleSet)> {
        let settings = match &self.settings {
            Some(path) => EngineSettings::load(path)?,
            None => EngineSettings::default(),
        };
        let rules = match &self.rules {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::builtin(),
        };
        Ok((settings, rules))
    }
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
const ENV_SETTINGS_PATH: &str = "KEYTRACE_SETTINGS";
const ENV_RULES_PATH: &str = "KEYTRACE_RULES";
const ENV_CONFIG_DIR: &str = "KEYTRACE_CONFIG_DIR";

/// Standard config file names.
const SETTINGS_FILENAME: &str = "config.toml";
const RULES_FILENAME: &str = "rules.json";

/// Application name for XDG directories.
const APP_NAME: &str = "keytrace";

/// Resolve configuration paths using the standard resolution order.
///
/// Resolution order for each config file:
/// 1. Explicit CLI path (if provided)
/// 2. Environment variable (KEYTRACE_SETTINGS, KEYTRACE_RULES)
/// 3. KEYTRACE_CONFIG_DIR environment variable + filename
/// 4. XDG config directory (~/.config/keytrace/)
/// 5. Built-in defaults (None)
pub fn resolve_config(cli_settings: Option<&Path>, cli_rules: Option<&Path>) -> ConfigPaths {
    let mut paths = ConfigPaths::default();

    paths.settings = resolve_single_config(
        cli_settings,
        ENV_SETTINGS_PATH,
        SETTINGS_FILENAME,
        &mut paths.settings_source,
    );

    paths.rules = resolve_single_config(
        cli_rules,
        ENV_RULES_PATH,
        RULES_FILENAME,
        &mut paths.rules_source,
    );

    paths
}

/// Resolve a single configuration file path.
fn resolve_single_config(
    cli_path: Option<&Path>,
    env_var: &str,
    filename: &str,
    source: &mut ConfigSource,
) -> Option<PathBuf> {
    // 1. CLI argument
    if let Some(path) = cli_path {
        if path.exists() {
            *source = ConfigSource::CliArgument;
            return Some(path.to_path_buf());
        }
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(env_var) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    // 3. Config dir environment variable + filename
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(filename);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    // 4. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(APP_NAME).join(filename);
        if path.exists() {
            *source = ConfigSource::XdgConfig;
            return Some(path);
        }
    }

    // 5. Built-in defaults
    *source = ConfigSource::BuiltinDefault;
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("config.toml");
        std::fs::write(&settings_path, "poll_interval_ms = 2000\n").unwrap();

        let paths = resolve_config(Some(&settings_path), None);
        assert_eq!(paths.settings, Some(settings_path));
        assert_eq!(paths.settings_source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_missing_cli_path_falls_through() {
        let paths = resolve_config(Some(Path::new("/nonexistent/config.toml")), None);
        // A dangling CLI path is not an error here; load-time reports it.
        assert_ne!(paths.settings_source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_load_builtin_defaults() {
        let paths = ConfigPaths::default();
        let (settings, rules) = paths.load().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(rules, RuleSet::builtin());
    }

    #[test]
    fn test_load_resolved_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("config.toml");
        let rules_path = dir.path().join("rules.json");
        std::fs::write(&settings_path, "module_name = \"libx.so\"\n").unwrap();
        std::fs::write(&rules_path, r#"[{ "match": "exact", "pattern": "f" }]"#).unwrap();

        let paths = resolve_config(Some(&settings_path), Some(&rules_path));
        let (settings, rules) = paths.load().unwrap();
        assert_eq!(settings.module_name, "libx.so");
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::CliArgument.to_string(), "CLI argument");
        assert_eq!(ConfigSource::BuiltinDefault.to_string(), "builtin default");
    }
}
