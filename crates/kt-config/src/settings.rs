//! Typed engine settings loaded from config.toml.
//!
//! Every field has a default so a missing or partial file is fine; CLI flags
//! override individual fields after loading.

use kt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default target library: the Widevine DRM engine.
pub const DEFAULT_MODULE_NAME: &str = "libwvdrmengine.so";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Name of the library to locate and hook.
    pub module_name: String,

    /// Poll interval while the module is absent (milliseconds).
    pub poll_interval_ms: u64,

    /// Optional ceiling on locate attempts. `None` retries indefinitely,
    /// matching the reference behavior of waiting for the operator to
    /// trigger the target module.
    pub max_attempts: Option<u32>,

    /// Delay between a dynamic-load sighting and the out-of-band rescan,
    /// giving the loader time to finish initializing the module
    /// (milliseconds).
    pub settle_delay_ms: u64,

    /// Bytes of each pointer argument read for the marker probe.
    pub probe_len: usize,

    /// Cap on bytes captured for a classified artifact.
    pub capture_len: usize,

    /// Number of leading argument slots logged and probed per call.
    pub arg_count: usize,

    /// Directory receiving persisted artifacts.
    pub output_dir: PathBuf,

    /// Also persist probed prefixes of unmatched buffers to the
    /// unidentified slot (off by default; used when extracting blobs that
    /// carry no textual marker, like client IDs).
    pub capture_unidentified: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            module_name: DEFAULT_MODULE_NAME.to_string(),
            poll_interval_ms: 1000,
            max_attempts: None,
            settle_delay_ms: 250,
            probe_len: 40,
            capture_len: 8192,
            arg_count: 4,
            output_dir: PathBuf::from("captures"),
            capture_unidentified: false,
        }
    }
}

impl EngineSettings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidSettings(format!("{}: {}", path.display(), e)))?;
        let settings: EngineSettings =
            toml::from_str(&data).map_err(|e| Error::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.module_name.is_empty() {
            return Err(Error::InvalidSettings("module_name is empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidSettings("poll_interval_ms must be > 0".into()));
        }
        if self.probe_len == 0 {
            return Err(Error::InvalidSettings("probe_len must be > 0".into()));
        }
        if self.capture_len < self.probe_len {
            return Err(Error::InvalidSettings(
                "capture_len must be >= probe_len".into(),
            ));
        }
        if self.arg_count == 0 {
            return Err(Error::InvalidSettings("arg_count must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let settings = EngineSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.module_name, "libwvdrmengine.so");
        assert_eq!(settings.probe_len, 40);
        assert_eq!(settings.max_attempts, None);
    }

    #[test]
    fn test_partial_toml() {
        let settings: EngineSettings =
            toml::from_str("module_name = \"libfoo.so\"\npoll_interval_ms = 500\n").unwrap();
        assert_eq!(settings.module_name, "libfoo.so");
        assert_eq!(settings.poll_interval_ms, 500);
        // Unspecified fields fall back to defaults.
        assert_eq!(settings.capture_len, 8192);
        assert!(!settings.capture_unidentified);
    }

    #[test]
    fn test_max_attempts_toml() {
        let settings: EngineSettings = toml::from_str("max_attempts = 30\n").unwrap();
        assert_eq!(settings.max_attempts, Some(30));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let settings = EngineSettings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_capture_smaller_than_probe() {
        let settings = EngineSettings {
            probe_len: 64,
            capture_len: 32,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "module_name = \"libbar.so\"\ncapture_unidentified = true\n")
            .unwrap();

        let settings = EngineSettings::load(&path).unwrap();
        assert_eq!(settings.module_name, "libbar.so");
        assert!(settings.capture_unidentified);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "module_name = [1, 2]\n").unwrap();
        assert!(matches!(
            EngineSettings::load(&path),
            Err(Error::InvalidSettings(_))
        ));
    }
}
