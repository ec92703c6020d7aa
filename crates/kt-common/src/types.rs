//! Core data model for module discovery and artifact capture.
//!
//! These types are snapshots: the locator replaces `TargetModule` and
//! `ExportSymbol` values wholesale on every rescan, and a `CapturedArtifact`
//! is never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// A loaded native library within the target process's address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetModule {
    /// Module name as it appears in the process's module list.
    pub name: String,

    /// Base address of the mapping.
    pub base: u64,

    /// Total mapped size in bytes.
    pub size: u64,

    /// Whether the module was loaded at snapshot time.
    pub loaded: bool,

    /// Backing file path, when the backend can resolve one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl TargetModule {
    /// Whether `address` falls inside this module's mapping.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.base.saturating_add(self.size)
    }
}

impl fmt::Display for TargetModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:#x} ({} bytes)", self.name, self.base, self.size)
    }
}

/// A named, externally callable entry point within a module.
///
/// Addresses are absolute and only valid while the owning module remains
/// loaded; a rescan invalidates every previously enumerated symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportSymbol {
    pub name: String,
    pub address: u64,
}

impl ExportSymbol {
    pub fn new(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl fmt::Display for ExportSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:#x}", self.name, self.address)
    }
}

/// Classification of a captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Buffer carrying a PEM-framed private key.
    KeyMaterial,

    /// Buffer the classifier could not identify.
    Unidentified,
}

impl ArtifactKind {
    /// Fixed on-disk file name for this kind.
    ///
    /// The latest capture of a kind overwrites this slot; captures are not
    /// versioned or merged.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::KeyMaterial => "key_material.pem",
            ArtifactKind::Unidentified => "unidentified.bin",
        }
    }

    /// Sidecar metadata file name for this kind.
    pub fn sidecar_name(&self) -> &'static str {
        match self {
            ArtifactKind::KeyMaterial => "key_material.json",
            ArtifactKind::Unidentified => "unidentified.json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::KeyMaterial => write!(f, "key_material"),
            ArtifactKind::Unidentified => write!(f, "unidentified"),
        }
    }
}

/// A captured piece of key material extracted from observed call arguments.
///
/// Created only inside an interception callback once classification
/// succeeds; immediately handed to the store and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedArtifact {
    pub kind: ArtifactKind,

    /// Raw captured bytes, up to the configured capture cap.
    pub bytes: Vec<u8>,

    /// Export symbol whose invocation produced this capture.
    pub symbol: String,

    pub captured_at: DateTime<Utc>,
}

impl CapturedArtifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            bytes,
            symbol: symbol.into(),
            captured_at: Utc::now(),
        }
    }

    /// SHA-256 of the raw bytes, lowercase hex.
    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

/// A single invocation of a hooked function, as delivered by the backend.
///
/// `args` holds the first N raw argument registers/slots; interpretation is
/// up to the observer (the hook manager treats each as a candidate pointer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    /// Absolute address of the hooked function.
    pub address: u64,

    /// Raw argument values in call order.
    pub args: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_contains() {
        let module = TargetModule {
            name: "libwvdrmengine.so".into(),
            base: 0x7000_0000,
            size: 0x1000,
            loaded: true,
            path: None,
        };
        assert!(module.contains(0x7000_0000));
        assert!(module.contains(0x7000_0fff));
        assert!(!module.contains(0x7000_1000));
        assert!(!module.contains(0x6fff_ffff));
    }

    #[test]
    fn test_artifact_kind_file_names() {
        assert_eq!(ArtifactKind::KeyMaterial.file_name(), "key_material.pem");
        assert_eq!(ArtifactKind::Unidentified.file_name(), "unidentified.bin");
        assert_eq!(ArtifactKind::KeyMaterial.sidecar_name(), "key_material.json");
    }

    #[test]
    fn test_artifact_sha256() {
        let artifact = CapturedArtifact::new(ArtifactKind::KeyMaterial, b"abc".to_vec(), "oecc01");
        assert_eq!(
            artifact.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_artifact_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ArtifactKind::KeyMaterial).unwrap(),
            "\"key_material\""
        );
        let kind: ArtifactKind = serde_json::from_str("\"unidentified\"").unwrap();
        assert_eq!(kind, ArtifactKind::Unidentified);
    }

    #[test]
    fn test_export_symbol_display() {
        let sym = ExportSymbol::new("oecc01", 0x7000_1234);
        assert_eq!(sym.to_string(), "oecc01 @ 0x70001234");
    }
}
