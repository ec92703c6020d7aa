//! Error types for Keytrace.
//!
//! Structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for retry logic
//!
//! The engine's failure policy is "skip and continue observing": most
//! variants here surface in logs and diagnostics rather than unwinding the
//! capture path. See the orchestrator for which categories abort startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Keytrace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors (settings, rule table).
    Config,
    /// Target process attachment errors.
    Attach,
    /// Module location and export enumeration errors.
    Scan,
    /// Interception installation and callback errors.
    Hook,
    /// Artifact capture and persistence errors.
    Capture,
    /// File I/O and serialization errors.
    Io,
    /// Platform and backend capability errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Attach => write!(f, "attach"),
            ErrorCategory::Scan => write!(f, "scan"),
            ErrorCategory::Hook => write!(f, "hook"),
            ErrorCategory::Capture => write!(f, "capture"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Unified error type for Keytrace.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid rule table: {0}")]
    InvalidRules(String),

    #[error("invalid settings file: {0}")]
    InvalidSettings(String),

    // Attach errors (20-29)
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("permission denied accessing process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("attach failed: {0}")]
    AttachFailed(String),

    // Scan errors (30-39)
    #[error("module '{name}' vanished during enumeration")]
    ModuleVanished { name: String },

    #[error("export enumeration failed: {0}")]
    ExportEnumeration(String),

    #[error("memory read failed at {address:#x} ({len} bytes): {reason}")]
    MemoryRead {
        address: u64,
        len: usize,
        reason: String,
    },

    // Hook errors (40-49)
    #[error("hook installation failed for '{symbol}' at {address:#x}: {reason}")]
    HookInstall {
        symbol: String,
        address: u64,
        reason: String,
    },

    // Capture errors (50-59)
    #[error("artifact persistence failed: {0}")]
    Persist(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("backend capability not available: {0}")]
    CapabilityMissing(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Attach errors
    /// - 30-39: Scan errors
    /// - 40-49: Hook errors
    /// - 50-59: Capture errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidRules(_) => 11,
            Error::InvalidSettings(_) => 12,
            Error::ProcessNotFound { .. } => 20,
            Error::PermissionDenied { .. } => 21,
            Error::AttachFailed(_) => 22,
            Error::ModuleVanished { .. } => 30,
            Error::ExportEnumeration(_) => 31,
            Error::MemoryRead { .. } => 32,
            Error::HookInstall { .. } => 40,
            Error::Persist(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
            Error::CapabilityMissing(_) => 71,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidRules(_) | Error::InvalidSettings(_) => {
                ErrorCategory::Config
            }

            Error::ProcessNotFound { .. }
            | Error::PermissionDenied { .. }
            | Error::AttachFailed(_) => ErrorCategory::Attach,

            Error::ModuleVanished { .. } | Error::ExportEnumeration(_) | Error::MemoryRead { .. } => {
                ErrorCategory::Scan
            }

            Error::HookInstall { .. } => ErrorCategory::Hook,

            Error::Persist(_) => ErrorCategory::Capture,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::UnsupportedPlatform(_) | Error::CapabilityMissing(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Recoverable errors resolve by retrying, rescanning, or fixing
    /// configuration; unrecoverable ones require operator intervention.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Config errors: recoverable by fixing the file
            Error::Config(_) => true,
            Error::InvalidRules(_) => true,
            Error::InvalidSettings(_) => true,

            // Attach: process gone is terminal, permission can be elevated
            Error::ProcessNotFound { .. } => false,
            Error::PermissionDenied { .. } => true,
            Error::AttachFailed(_) => true,

            // Scan: transient, next poll cycle retries
            Error::ModuleVanished { .. } => true,
            Error::ExportEnumeration(_) => true,
            Error::MemoryRead { .. } => true,

            // Hook: the symbol is skipped, others proceed
            Error::HookInstall { .. } => true,

            // Capture: reported once, engine continues
            Error::Persist(_) => true,

            // I/O: often transient
            Error::Io(_) => true,
            Error::Json(_) => true,

            // Platform: not recoverable at runtime
            Error::UnsupportedPlatform(_) => false,
            Error::CapabilityMissing(_) => false,
        }
    }
}
