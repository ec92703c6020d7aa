//! Keytrace configuration loading and validation.
//!
//! This crate provides:
//! - The data-driven pattern rule table (rules.json)
//! - Typed engine settings (config.toml)
//! - Config resolution (CLI → env → XDG → defaults)

pub mod resolve;
pub mod rules;
pub mod settings;

pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use rules::{CompiledRuleSet, PatternRule, RuleSet};
pub use settings::EngineSettings;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
