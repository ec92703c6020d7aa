//! Exit codes for the keytrace CLI.
//!
//! Exit codes communicate operation outcome without requiring output
//! parsing.
//!
//! Exit code ranges:
//! - 0-6: Success/operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use kt_common::{Error, ErrorCategory};

/// Exit codes for keytrace operations.
///
/// These codes are a stable contract for automation. Changes require a
/// major version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: engine ran and hooks were installed / scan found matches
    Clean = 0,

    /// Target module never appeared
    ModuleNotFound = 1,

    /// Module located but no export matched the rule table
    NoSymbolsMatched = 2,

    /// Run interrupted before completion
    Interrupted = 6,

    /// Invalid arguments
    ArgsError = 10,

    /// Invalid configuration (settings or rule table)
    ConfigError = 11,

    /// Backend lacks a required capability
    CapabilityError = 12,

    /// Unsupported platform
    PlatformError = 13,

    /// Could not attach to the target process
    AttachError = 14,

    /// Unexpected internal error
    InternalError = 20,
}

impl ExitCode {
    /// Terminate the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }

    /// Map an engine error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Attach => ExitCode::AttachError,
            ErrorCategory::Platform => match err {
                Error::CapabilityMissing(_) => ExitCode::CapabilityError,
                _ => ExitCode::PlatformError,
            },
            ErrorCategory::Scan
            | ErrorCategory::Hook
            | ErrorCategory::Capture
            | ErrorCategory::Io => ExitCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::Clean as i32, 0);
        assert_eq!(ExitCode::ModuleNotFound as i32, 1);
        assert_eq!(ExitCode::NoSymbolsMatched as i32, 2);
        assert_eq!(ExitCode::ConfigError as i32, 11);
        assert_eq!(ExitCode::InternalError as i32, 20);
    }

    #[test]
    fn test_from_error_mapping() {
        assert_eq!(
            ExitCode::from_error(&Error::InvalidRules("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::ProcessNotFound { pid: 1 }),
            ExitCode::AttachError
        );
        assert_eq!(
            ExitCode::from_error(&Error::CapabilityMissing("interception".into())),
            ExitCode::CapabilityError
        );
        assert_eq!(
            ExitCode::from_error(&Error::UnsupportedPlatform("macos".into())),
            ExitCode::PlatformError
        );
    }
}
