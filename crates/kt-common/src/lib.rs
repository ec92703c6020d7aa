//! Keytrace common types, IDs, and errors.
//!
//! This crate provides foundational types shared across kt-core modules:
//! - Module and export-symbol snapshots
//! - Captured artifact model with integrity digests
//! - Run identity for log correlation
//! - Common error types with stable codes

pub mod error;
pub mod id;
pub mod output;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use id::RunId;
pub use output::OutputFormat;
pub use types::{ArtifactKind, CallEvent, CapturedArtifact, ExportSymbol, TargetModule};
