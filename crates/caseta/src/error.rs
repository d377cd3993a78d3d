//! CLI error types with miette diagnostics.
//!
//! Maps tool failures and `CoreError` kinds into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use caseta_config::ConfigError;
use caseta_core::{CoreError, ErrorKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(caseta::not_connected),
        help(
            "Check that the bridge is powered and reachable.\n\
             If it has never been paired: caseta pair <bridge-ip>"
        )
    )]
    NotConnected { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(caseta::timeout),
        help("Increase the limit with --timeout or check the bridge's network link.")
    )]
    Timeout { message: String },

    // ── Pairing & certificates ───────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(caseta::pairing_timeout),
        help(
            "Press and release the small black button on the back of the bridge\n\
             right after the prompt appears."
        )
    )]
    PairingTimeout { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(caseta::pairing_failed),
        help("Make sure the IP belongs to a Caseta Smart Bridge and try again.")
    )]
    PairingFailed { message: String },

    #[error("{message}")]
    #[diagnostic(code(caseta::certificate_missing), help("Run: caseta pair <bridge-ip>"))]
    CertificateMissing { message: String },

    #[error("{message}")]
    #[diagnostic(
        code(caseta::write_error),
        help("Choose a writable directory with --output-dir or --cert-dir.")
    )]
    WriteError { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(caseta::unknown_device),
        help("Run: caseta devices --domain <domain> to see device ids")
    )]
    UnknownDevice { message: String },

    #[error("{message}")]
    #[diagnostic(code(caseta::unsupported))]
    Unsupported { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(caseta::validation))]
    Validation { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(caseta::config),
        help("Check the config file and the LUTRON_* environment variables.")
    )]
    Config(#[from] ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(caseta::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot encode output: {0}")]
    #[diagnostic(code(caseta::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Build from a tool failure's `error_kind` and message.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotConnected => Self::NotConnected { message },
            ErrorKind::Timeout => Self::Timeout { message },
            ErrorKind::UnknownDevice => Self::UnknownDevice { message },
            ErrorKind::CapabilityError => Self::Unsupported { message },
            ErrorKind::InvalidArgument => Self::Validation { message },
            ErrorKind::PairingTimeout => Self::PairingTimeout { message },
            ErrorKind::PairingFailed => Self::PairingFailed { message },
            ErrorKind::CertificateMissing => Self::CertificateMissing { message },
            ErrorKind::WriteError => Self::WriteError { message },
            ErrorKind::Internal => Self::Internal { message },
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } | Self::PairingTimeout { .. } => exit_code::TIMEOUT,
            Self::PairingFailed { .. } | Self::CertificateMissing { .. } => exit_code::AUTH,
            Self::UnknownDevice { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } | Self::WriteError { .. } => exit_code::PERMISSION,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Internal { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::from_kind(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_exit_codes() {
        let err: CliError = CoreError::NotConnected.into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);

        let err = CliError::from_kind(ErrorKind::InvalidArgument, "bad level".into());
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(err.to_string(), "bad level");

        let err: CliError = CoreError::PairingTimeout { timeout_secs: 30 }.into();
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
    }
}
