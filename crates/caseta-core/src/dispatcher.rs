// ── Command dispatcher ──
//
// The callable surface behind the tools. Every operation validates its
// input, forwards to the pairing client or the connection, and folds the
// outcome into a `ToolResponse`: `{success: true, ...payload}` or
// `{success: false, error_kind, message}`. Nothing here returns an error to
// the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::certs::CertificateStore;
use crate::config::BridgeConfig;
use crate::connection::{BridgeConnection, CommandResult, ConnectionState};
use crate::error::{CoreError, ErrorKind};
use crate::model::{CertificatePaths, CertificateStatus, Device, Domain};
use crate::pairing::PairingClient;
use crate::registry::DeviceRegistry;
use crate::transport::{BridgeTransport, LeapPairing, LeapTransport, PairingTransport};
use crate::validation;

/// Domain listed when the caller does not name one.
pub const DEFAULT_DOMAIN: Domain = Domain::Light;

// ── Response shapes ──────────────────────────────────────────────

/// Uniform tool response.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolResponse<T> {
    Success {
        success: bool,
        #[serde(flatten)]
        payload: T,
    },
    Failure {
        success: bool,
        error_kind: ErrorKind,
        message: String,
    },
}

impl<T> ToolResponse<T> {
    pub fn ok(payload: T) -> Self {
        Self::Success {
            success: true,
            payload,
        }
    }

    pub fn failure(err: &CoreError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            error!(error = %err, "tool operation failed");
        }
        Self::Failure {
            success: false,
            error_kind: kind,
            message: err.to_string(),
        }
    }

    pub fn from_result(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::failure(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_kind, .. } => Some(*error_kind),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub message: String,
    pub bridge_ip: String,
    pub cert_dir: PathBuf,
    pub certificate_paths: CertificatePaths,
    pub bridge_version: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub bridge_ip: Option<String>,
    pub cert_dir: PathBuf,
    pub certificates_present: bool,
    pub certificates: CertificateStatus,
    pub connected: bool,
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    pub domain: Domain,
    pub count: usize,
    pub devices: Vec<Arc<Device>>,
}

impl DeviceList {
    fn new(domain: Domain, devices: Vec<Arc<Device>>) -> Self {
        Self {
            domain,
            count: devices.len(),
            devices,
        }
    }
}

// ── CommandDispatcher ────────────────────────────────────────────

/// Owns the shared connection, registry, and pairing client.
///
/// Host and certificate store start from the config and follow the last
/// successful pairing.
#[derive(Debug)]
pub struct CommandDispatcher {
    host: ArcSwapOption<String>,
    store: ArcSwap<CertificateStore>,
    connection: Arc<BridgeConnection>,
    registry: Arc<DeviceRegistry>,
    pairing: PairingClient,
}

impl CommandDispatcher {
    /// Dispatcher talking LEAP to a real bridge.
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_transports(
            config,
            Arc::new(LeapTransport::new(config)),
            Arc::new(LeapPairing::new(config)),
        )
    }

    pub fn with_transports(
        config: &BridgeConfig,
        bridge: Arc<dyn BridgeTransport>,
        pairing: Arc<dyn PairingTransport>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let connection = Arc::new(BridgeConnection::new(
            Arc::clone(&bridge),
            Arc::clone(&registry),
            config.command_timeout,
        ));
        Self {
            host: ArcSwapOption::from(config.host.clone().map(Arc::new)),
            store: ArcSwap::from_pointee(CertificateStore::new(config.cert_dir.clone())),
            connection,
            registry,
            pairing: PairingClient::new(
                pairing,
                bridge,
                config.pairing_timeout,
                config.command_timeout,
            ),
        }
    }

    pub fn connection(&self) -> &Arc<BridgeConnection> {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> Arc<CertificateStore> {
        self.store.load_full()
    }

    pub fn host(&self) -> Option<String> {
        self.host.load_full().map(|h| h.as_ref().clone())
    }

    pub fn pairing_timeout(&self) -> Duration {
        self.pairing.timeout()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect at startup when a bridge IP and a full bundle are configured.
    ///
    /// Returns `Ok(false)` when there is nothing to connect to yet.
    pub async fn start(&self) -> Result<bool, CoreError> {
        let Some(host) = self.host() else {
            info!("no bridge IP configured; waiting for pairing");
            return Ok(false);
        };
        let store = self.store();
        if !store.status().all_present() {
            info!(cert_dir = %store.directory().display(), "bridge not paired yet");
            return Ok(false);
        }
        self.connect_to(&host, &store).await?;
        Ok(true)
    }

    /// Connect to the configured bridge with the configured bundle.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let host = self
            .host()
            .ok_or_else(|| CoreError::invalid_argument("No bridge IP configured"))?;
        self.connect_to(&host, &self.store()).await
    }

    async fn connect_to(&self, host: &str, store: &CertificateStore) -> Result<(), CoreError> {
        let host = validation::validate_host_ip(host)?.to_string();
        let bundle = store.load()?;
        self.connection.connect(&host, &bundle).await
    }

    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
    }

    // ── Tools ────────────────────────────────────────────────────

    /// Pair with the bridge at `host`, then reconfigure to it and connect.
    ///
    /// `output_dir` of `None` or `"."` means the current cert dir. After a
    /// successful pairing the bundle's directory becomes the current one.
    pub async fn pair_bridge(
        &self,
        host: &str,
        output_dir: Option<&Path>,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> ToolResponse<PairReport> {
        ToolResponse::from_result(self.try_pair_bridge(host, output_dir, on_ready).await)
    }

    async fn try_pair_bridge(
        &self,
        host: &str,
        output_dir: Option<&Path>,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> Result<PairReport, CoreError> {
        let host = validation::validate_host_ip(host)?.to_string();
        let store = match output_dir {
            Some(dir) if dir != Path::new(".") && !dir.as_os_str().is_empty() => {
                CertificateStore::new(dir)
            }
            _ => self.store().as_ref().clone(),
        };

        let outcome = self.pairing.pair(&host, &store, on_ready).await?;
        self.host.store(Some(Arc::new(host.clone())));
        let cert_dir = store.directory().to_path_buf();
        self.store.store(Arc::new(store.clone()));

        let connected = match self.connect_to(&host, &store).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%host, error = %e, "paired but could not connect");
                false
            }
        };

        let message = if connected {
            format!("Paired with bridge at {host} and connected")
        } else {
            format!("Paired with bridge at {host}; connection not yet established")
        };
        Ok(PairReport {
            message,
            bridge_ip: host,
            cert_dir,
            certificate_paths: outcome.paths,
            bridge_version: outcome.bridge_version,
            connected,
        })
    }

    /// Health report. Reads files and state only; never touches the network.
    pub fn check_connection(&self) -> ToolResponse<ConnectionReport> {
        let store = self.store();
        let certificates = store.status();
        let state = self.connection.state();
        ToolResponse::ok(ConnectionReport {
            bridge_ip: self.host(),
            cert_dir: store.directory().to_path_buf(),
            certificates_present: certificates.all_present(),
            certificates,
            connected: state == ConnectionState::Connected,
            state: state.to_string(),
        })
    }

    /// Refresh from the bridge and list one domain (`light` by default).
    pub async fn list_devices(&self, domain: Option<&str>) -> ToolResponse<DeviceList> {
        ToolResponse::from_result(self.try_list_devices(domain).await)
    }

    async fn try_list_devices(&self, domain: Option<&str>) -> Result<DeviceList, CoreError> {
        let domain = parse_domain(domain)?;
        let devices = self.connection.list_devices(Some(domain)).await?;
        Ok(DeviceList::new(domain, devices))
    }

    /// List one domain from the registry snapshot, without a bridge round
    /// trip. Levels reflect the latest successful commands.
    pub fn list_cached_devices(&self, domain: Option<&str>) -> ToolResponse<DeviceList> {
        ToolResponse::from_result(
            parse_domain(domain).map(|domain| DeviceList::new(domain, self.registry.by_domain(domain))),
        )
    }

    pub async fn turn_on(&self, device_id: &str) -> ToolResponse<CommandResult> {
        ToolResponse::from_result(self.power(device_id, true).await)
    }

    pub async fn turn_off(&self, device_id: &str) -> ToolResponse<CommandResult> {
        ToolResponse::from_result(self.power(device_id, false).await)
    }

    /// Range is checked before anything else; an out-of-range level never
    /// reaches the connection.
    pub async fn set_level(&self, device_id: &str, level: i64) -> ToolResponse<CommandResult> {
        ToolResponse::from_result(self.try_set_level(device_id, level).await)
    }

    async fn try_set_level(&self, device_id: &str, level: i64) -> Result<CommandResult, CoreError> {
        let level = validation::validate_level(level)?;
        let device_id = validation::validate_device_id(device_id)?;
        let result = self
            .connection
            .set_level(device_id, i64::from(level))
            .await?;
        self.registry.record_level(device_id, level);
        Ok(result)
    }

    async fn power(&self, device_id: &str, on: bool) -> Result<CommandResult, CoreError> {
        let device_id = validation::validate_device_id(device_id)?;
        let result = self.connection.set_power(device_id, on).await?;
        self.registry
            .record_level(device_id, if on { 100 } else { 0 });
        Ok(result)
    }
}

fn parse_domain(domain: Option<&str>) -> Result<Domain, CoreError> {
    domain.map_or(Ok(DEFAULT_DOMAIN), validation::validate_domain)
}
