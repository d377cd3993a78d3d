use thiserror::Error;

/// Top-level error type for the `caseta-api` crate.
///
/// Covers every failure mode of the LEAP wire layer: socket setup, TLS,
/// framing, and bridge-reported failures. `caseta-core` maps these into
/// its user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// TCP connect to the bridge failed (refused, unreachable, etc.)
    #[error("Cannot connect to bridge at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket-level I/O failure on an established channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge closed the channel.
    #[error("Connection closed by bridge")]
    ConnectionClosed,

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── TLS ─────────────────────────────────────────────────────────
    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// PEM material could not be parsed.
    #[error("Invalid certificate material: {0}")]
    Certificate(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// The bridge answered with a non-2xx LEAP status.
    #[error("Bridge returned {status} for {url}")]
    Status { url: String, status: String },

    /// The bridge refused the pairing request.
    #[error("Pairing rejected by bridge: {0}")]
    PairingRejected(String),

    /// A frame arrived that does not fit the exchange in progress.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A frame exceeded the maximum line length.
    #[error("LEAP frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw frame for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the channel this error came from is no longer usable.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionClosed | Self::Connect { .. } | Self::Tls(_)
        )
    }

    /// Returns `true` if the bridge could not be reached at all.
    pub fn is_refused(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            ),
            Self::ConnectionClosed => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connect_counts_as_refused_and_lost() {
        let err = Error::Connect {
            addr: "192.168.1.50:8081".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(err.is_refused());
        assert!(err.is_connection_loss());
    }

    #[test]
    fn bridge_status_is_not_a_connection_loss() {
        let err = Error::Status {
            url: "/zone/1/commandprocessor".into(),
            status: "404 NotFound".into(),
        };
        assert!(!err.is_connection_loss());
        assert!(!err.is_refused());
    }
}
