// ── Runtime bridge configuration ──
//
// Describes which bridge to talk to and how long to wait for it. Built by
// the binary from `caseta-config` and handed in; core never reads config
// files, only the credential bundle.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// How long the user has to press the bridge button.
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for one bridge command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for TCP connect plus TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Name the bridge shows for this client in the Lutron app.
pub const DEFAULT_DISPLAY_NAME: &str = "caseta-mcp";

/// Optional client identity presented on the pairing channel.
#[derive(Debug, Clone)]
pub struct PairingIdentity {
    pub cert_pem: Vec<u8>,
    pub key_pem: SecretString,
}

/// Configuration for one bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge IP address, if known yet.
    pub host: Option<String>,
    /// Directory holding the credential bundle.
    pub cert_dir: PathBuf,
    pub pairing_timeout: Duration,
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
    pub display_name: String,
    pub pairing_identity: Option<PairingIdentity>,
}

impl BridgeConfig {
    pub fn new(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: None,
            cert_dir: cert_dir.into(),
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            display_name: DEFAULT_DISPLAY_NAME.to_owned(),
            pairing_identity: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}
