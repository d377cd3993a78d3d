// ── Credential types ──

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Serialize;

/// Bridge CA certificate file name.
pub const CA_CERT_FILE: &str = "caseta-bridge.crt";
/// Signed client certificate file name.
pub const CLIENT_CERT_FILE: &str = "caseta.crt";
/// Client private key file name.
pub const CLIENT_KEY_FILE: &str = "caseta.key";

/// The three artifacts needed for an authenticated session.
pub struct CredentialBundle {
    pub ca_cert: Vec<u8>,
    pub client_cert: Vec<u8>,
    pub client_key: SecretString,
    pub directory: PathBuf,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("ca_cert", &format_args!("{} bytes", self.ca_cert.len()))
            .field("client_cert", &format_args!("{} bytes", self.client_cert.len()))
            .field("client_key", &self.client_key)
            .field("directory", &self.directory)
            .finish()
    }
}

/// Where each artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificatePaths {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl CertificatePaths {
    pub fn in_dir(directory: &Path) -> Self {
        Self {
            ca_path: directory.join(CA_CERT_FILE),
            cert_path: directory.join(CLIENT_CERT_FILE),
            key_path: directory.join(CLIENT_KEY_FILE),
        }
    }
}

/// Per-file presence of the credential bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CertificateStatus {
    pub ca: bool,
    pub cert: bool,
    pub key: bool,
}

impl CertificateStatus {
    pub fn all_present(self) -> bool {
        self.ca && self.cert && self.key
    }
}

/// Result of a successful pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingOutcome {
    /// LEAP version reported by the bridge, if the post-pairing probe worked.
    pub bridge_version: Option<String>,
    pub paths: CertificatePaths,
}
