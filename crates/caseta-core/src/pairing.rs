// ── Bridge pairing ──
//
// One attempt: generate a key and CSR, wait (bounded) for the user to press
// the bridge button while the pairing transport exchanges the CSR, then
// persist the signed bundle. Nothing touches disk until the bridge has
// signed, so a timed-out attempt leaves no files and a retry starts clean.

use std::sync::Arc;
use std::time::Duration;

use rcgen::{CertificateParams, DnType, KeyPair};
use secrecy::SecretString;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::certs::CertificateStore;
use crate::config::DEFAULT_DISPLAY_NAME;
use crate::error::CoreError;
use crate::model::{CredentialBundle, PairingOutcome};
use crate::transport::{BridgeTransport, PairingTransport};

/// State of one pairing attempt. Dropped on success, timeout, or
/// cancellation, taking the generated key with it.
pub struct PairingSession {
    pub host: String,
    pub deadline: Instant,
    key: KeyPair,
    csr: String,
}

impl std::fmt::Debug for PairingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingSession")
            .field("host", &self.host)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PairingSession {
    /// Generate a fresh key and CSR for `host`.
    pub fn start(host: &str, timeout: Duration) -> Result<Self, CoreError> {
        let key = KeyPair::generate().map_err(crypto_error)?;
        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(crypto_error)?;
        params
            .distinguished_name
            .push(DnType::CommonName, DEFAULT_DISPLAY_NAME);
        let csr = params
            .serialize_request(&key)
            .and_then(|req| req.pem())
            .map_err(crypto_error)?;

        Ok(Self {
            host: host.to_owned(),
            deadline: Instant::now() + timeout,
            key,
            csr,
        })
    }

    pub fn csr(&self) -> &str {
        &self.csr
    }

    fn private_key_pem(&self) -> SecretString {
        SecretString::from(self.key.serialize_pem())
    }
}

fn crypto_error(e: rcgen::Error) -> CoreError {
    CoreError::Internal(format!("key generation failed: {e}"))
}

/// Drives the pairing ceremony.
pub struct PairingClient {
    transport: Arc<dyn PairingTransport>,
    bridge: Arc<dyn BridgeTransport>,
    timeout: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for PairingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PairingClient {
    pub fn new(
        transport: Arc<dyn PairingTransport>,
        bridge: Arc<dyn BridgeTransport>,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            bridge,
            timeout,
            probe_timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pair with the bridge at `host` and save the credentials in `store`,
    /// overwriting any existing bundle.
    ///
    /// `on_ready` fires once the pairing channel is open and waiting for the
    /// button press.
    pub async fn pair(
        &self,
        host: &str,
        store: &CertificateStore,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> Result<PairingOutcome, CoreError> {
        let session = PairingSession::start(host, self.timeout)?;
        let timeout_secs = self.timeout.as_secs();
        info!(host, timeout_secs, "pairing started");

        let signed = match tokio::time::timeout_at(
            session.deadline,
            self.transport
                .request_certificate(host, session.csr(), on_ready),
        )
        .await
        {
            Ok(Ok(signed)) => signed,
            Ok(Err(e)) => {
                warn!(host, error = %e, "pairing failed");
                return Err(match e {
                    CoreError::PairingFailed { .. } => e,
                    other => CoreError::PairingFailed {
                        reason: other.to_string(),
                    },
                });
            }
            Err(_) => {
                warn!(host, timeout_secs, "pairing timed out waiting for button press");
                return Err(CoreError::PairingTimeout { timeout_secs });
            }
        };

        let bundle = CredentialBundle {
            ca_cert: signed.root_certificate.into_bytes(),
            client_cert: signed.certificate.into_bytes(),
            client_key: session.private_key_pem(),
            directory: store.directory().to_path_buf(),
        };
        let paths = store.save(&bundle)?;
        let bridge_version = self.probe_version(host, &bundle).await;

        info!(host, ?bridge_version, "pairing complete");
        Ok(PairingOutcome {
            bridge_version,
            paths,
        })
    }

    /// Best effort: open an authenticated session with the new bundle and
    /// read the LEAP version.
    async fn probe_version(&self, host: &str, bundle: &CredentialBundle) -> Option<String> {
        match tokio::time::timeout(self.probe_timeout, self.read_version(host, bundle)).await {
            Ok(Ok(version)) => Some(version),
            Ok(Err(e)) => {
                warn!(host, error = %e, "could not read bridge version after pairing");
                None
            }
            Err(_) => {
                warn!(host, "bridge version probe timed out");
                None
            }
        }
    }

    async fn read_version(&self, host: &str, bundle: &CredentialBundle) -> Result<String, CoreError> {
        let mut session = self.bridge.open(host, bundle).await?;
        let version = session.leap_version().await;
        if let Err(e) = session.close().await {
            debug!(error = %e, "probe session close failed");
        }
        version
    }
}
