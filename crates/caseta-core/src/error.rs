// ── Core error types ──
//
// User-facing errors from caseta-core. Consumers never see LEAP status
// lines or TLS internals directly: the `From<caseta_api::Error>` impl
// translates wire-layer failures into this taxonomy, and `kind()` collapses
// every variant onto the stable names reported by the tool surface.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::model::Capability;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Not connected to a bridge")]
    NotConnected,

    #[error("Cannot connect to bridge at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Connection to bridge lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("Bridge did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    #[error("Device {device_id} does not support {capability}")]
    CapabilityError {
        device_id: String,
        capability: Capability,
    },

    #[error("{message}")]
    InvalidArgument { message: String },

    // ── Pairing errors ───────────────────────────────────────────────
    #[error(
        "Pairing timed out after {timeout_secs}s; press the button on the bridge and try again"
    )]
    PairingTimeout { timeout_secs: u64 },

    #[error("Pairing failed: {reason}")]
    PairingFailed { reason: String },

    // ── Certificate errors ───────────────────────────────────────────
    #[error("Certificates missing in {}: {}", directory.display(), missing.join(", "))]
    CertificateMissing {
        directory: PathBuf,
        missing: Vec<&'static str>,
    },

    #[error("Invalid certificate material: {message}")]
    InvalidCertificate { message: String },

    #[error("Cannot write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Bridge / internal errors ─────────────────────────────────────
    #[error("Bridge rejected {url}: {status}")]
    Rejected { url: String, status: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error names reported as `error_kind` on the tool surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
pub enum ErrorKind {
    NotConnected,
    UnknownDevice,
    CapabilityError,
    InvalidArgument,
    PairingTimeout,
    PairingFailed,
    CertificateMissing,
    WriteError,
    Timeout,
    Internal,
}

impl CoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected | Self::ConnectionFailed { .. } | Self::ConnectionLost { .. } => {
                ErrorKind::NotConnected
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::UnknownDevice { .. } => ErrorKind::UnknownDevice,
            Self::CapabilityError { .. } => ErrorKind::CapabilityError,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::PairingTimeout { .. } => ErrorKind::PairingTimeout,
            Self::PairingFailed { .. } => ErrorKind::PairingFailed,
            Self::CertificateMissing { .. } | Self::InvalidCertificate { .. } => {
                ErrorKind::CertificateMissing
            }
            Self::WriteError { .. } => ErrorKind::WriteError,
            Self::Rejected { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the session that produced this error can no longer be used.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost { .. } | Self::ConnectionFailed { .. }
        )
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<caseta_api::Error> for CoreError {
    fn from(err: caseta_api::Error) -> Self {
        use caseta_api::Error as Api;

        match err {
            Api::Connect { addr, source } => Self::ConnectionFailed {
                host: addr,
                reason: source.to_string(),
            },
            Api::Io(e) => Self::ConnectionLost {
                reason: e.to_string(),
            },
            Api::ConnectionClosed => Self::ConnectionLost {
                reason: "bridge closed the connection".into(),
            },
            Api::Tls(reason) => Self::ConnectionLost { reason },
            Api::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            Api::Certificate(message) => Self::InvalidCertificate { message },
            Api::Status { url, status } => Self::Rejected { url, status },
            Api::PairingRejected(reason) => Self::PairingFailed { reason },
            Api::UnexpectedResponse(message) => Self::Internal(message),
            Api::FrameTooLarge { max } => {
                Self::Internal(format!("bridge sent a frame larger than {max} bytes"))
            }
            Api::Deserialization { message, .. } => {
                Self::Internal(format!("unreadable bridge response: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_taxonomy() {
        assert_eq!(CoreError::NotConnected.kind().to_string(), "NotConnected");
        assert_eq!(
            CoreError::invalid_argument("level out of range")
                .kind()
                .to_string(),
            "InvalidArgument"
        );
        assert_eq!(
            CoreError::ConnectionLost { reason: "eof".into() }.kind(),
            ErrorKind::NotConnected
        );
    }

    #[test]
    fn wire_errors_translate() {
        let lost: CoreError = caseta_api::Error::ConnectionClosed.into();
        assert!(lost.is_connection_loss());

        let rejected: CoreError = caseta_api::Error::Status {
            url: "/zone/3/commandprocessor".into(),
            status: "400 BadRequest".into(),
        }
        .into();
        assert!(!rejected.is_connection_loss());
        assert_eq!(rejected.kind(), ErrorKind::Internal);

        let timeout: CoreError = caseta_api::Error::Timeout { timeout_secs: 10 }.into();
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
    }
}
