// ── Bridge connection lifecycle ──
//
// Owns at most one authenticated session. Connect, disconnect, and every
// command serialize on the session mutex; the state lives in a `watch`
// channel so health checks never wait on an in-flight command. There is no
// keep-alive: a lost session is noticed by the next command, which moves
// the state to `Failed` and drops the session.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Capability, CredentialBundle, Device, Domain};
use crate::registry::DeviceRegistry;
use crate::transport::{BridgeSession, BridgeTransport};
use crate::validation;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

// ── CommandResult ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    TurnOn,
    TurnOff,
    SetLevel,
}

/// Outcome of one device command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub device_id: String,
    pub action: Action,
    /// Always `true` for a returned result; failures are errors. Carried by
    /// the response envelope on the tool surface.
    #[serde(skip)]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

// ── BridgeConnection ─────────────────────────────────────────────

struct ActiveSession {
    host: String,
    session: Box<dyn BridgeSession>,
}

/// The single shared connection to a bridge.
pub struct BridgeConnection {
    transport: Arc<dyn BridgeTransport>,
    registry: Arc<DeviceRegistry>,
    command_timeout: Duration,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<ActiveSession>>,
}

impl std::fmt::Debug for BridgeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConnection")
            .field("state", &*self.state.borrow())
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl BridgeConnection {
    pub fn new(
        transport: Arc<dyn BridgeTransport>,
        registry: Arc<DeviceRegistry>,
        command_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            registry,
            command_timeout,
            state,
            session: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open a session to `host` and load the initial device list.
    ///
    /// An existing session is closed first. On failure the state ends
    /// `Failed` and the registry is emptied.
    pub async fn connect(&self, host: &str, bundle: &CredentialBundle) -> Result<(), CoreError> {
        let mut guard = self.session.lock().await;
        if let Some(old) = guard.take() {
            debug!(host = %old.host, "closing previous session before reconnect");
            close_quietly(old.session).await;
        }

        self.state.send_replace(ConnectionState::Connecting);
        info!(host, "connecting to bridge");

        match self.open_and_list(host, bundle).await {
            Ok((session, devices)) => {
                let count = devices.len();
                self.registry.replace(devices);
                *guard = Some(ActiveSession {
                    host: host.to_owned(),
                    session,
                });
                self.state.send_replace(ConnectionState::Connected);
                info!(host, devices = count, "connected to bridge");
                Ok(())
            }
            Err(e) => {
                self.registry.clear();
                self.state
                    .send_replace(ConnectionState::Failed(e.to_string()));
                warn!(host, error = %e, "bridge connection failed");
                Err(e)
            }
        }
    }

    async fn open_and_list(
        &self,
        host: &str,
        bundle: &CredentialBundle,
    ) -> Result<(Box<dyn BridgeSession>, Vec<Device>), CoreError> {
        let mut session = self.transport.open(host, bundle).await?;
        match self.bounded(session.devices()).await {
            Ok(devices) => Ok((session, devices)),
            Err(e) => {
                close_quietly(session).await;
                Err(e)
            }
        }
    }

    /// Close the session, if any. Always ends `Disconnected`.
    pub async fn disconnect(&self) {
        let mut guard = self.session.lock().await;
        if let Some(active) = guard.take() {
            close_quietly(active.session).await;
            info!(host = %active.host, "disconnected from bridge");
        }
        self.registry.clear();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Read the full device list from the bridge. Does not touch the
    /// registry; see [`DeviceRegistry::refresh`].
    pub async fn fetch_devices(&self) -> Result<Vec<Device>, CoreError> {
        let mut guard = self.session.lock().await;
        let session = self.require_session(&mut guard)?;
        let outcome = self.bounded(session.devices()).await;
        self.settle(&mut guard, outcome)
    }

    /// Refresh the registry and return the devices in `domain` (all when
    /// `None`).
    pub async fn list_devices(&self, domain: Option<Domain>) -> Result<Vec<Arc<Device>>, CoreError> {
        let all = self.registry.refresh(self).await?;
        Ok(all
            .iter()
            .filter(|d| domain.is_none_or(|wanted| d.domain == wanted))
            .cloned()
            .collect())
    }

    /// Switch a device fully on (level 100) or off (level 0).
    pub async fn set_power(&self, device_id: &str, on: bool) -> Result<CommandResult, CoreError> {
        let level = if on { 100 } else { 0 };
        let action = if on { Action::TurnOn } else { Action::TurnOff };
        self.command(device_id, Capability::OnOff, level, action)
            .await
    }

    /// Drive a dimmable device to `level`, which must be within 0..=100.
    pub async fn set_level(&self, device_id: &str, level: i64) -> Result<CommandResult, CoreError> {
        let level = validation::validate_level(level)?;
        self.command(device_id, Capability::Level, level, Action::SetLevel)
            .await
    }

    async fn command(
        &self,
        device_id: &str,
        capability: Capability,
        level: u8,
        action: Action,
    ) -> Result<CommandResult, CoreError> {
        let mut guard = self.session.lock().await;
        let session = self.require_session(&mut guard)?;

        let device = self.registry.get(device_id)?;
        if !device.supports(capability) {
            return Err(CoreError::CapabilityError {
                device_id: device_id.to_owned(),
                capability,
            });
        }

        debug!(device_id, %action, level, "sending device command");
        let outcome = self.bounded(session.set_level(device, level)).await;
        self.settle(&mut guard, outcome)?;

        Ok(CommandResult {
            device_id: device_id.to_owned(),
            action,
            success: true,
            detail: None,
            level: Some(level),
        })
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn require_session<'a>(
        &self,
        guard: &'a mut MutexGuard<'_, Option<ActiveSession>>,
    ) -> Result<&'a mut Box<dyn BridgeSession>, CoreError> {
        if !self.is_connected() {
            return Err(CoreError::NotConnected);
        }
        guard
            .as_mut()
            .map(|active| &mut active.session)
            .ok_or(CoreError::NotConnected)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: self.command_timeout.as_secs(),
            })?
    }

    /// Record a lost session; other errors pass through untouched.
    fn settle<T>(
        &self,
        guard: &mut MutexGuard<'_, Option<ActiveSession>>,
        outcome: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let reason = match &outcome {
            Err(e) if e.is_connection_loss() => e.to_string(),
            _ => return outcome,
        };
        if let Some(active) = guard.take() {
            warn!(host = %active.host, error = %reason, "bridge session lost");
        }
        self.state.send_replace(ConnectionState::Failed(reason));
        outcome
    }
}

async fn close_quietly(session: Box<dyn BridgeSession>) {
    if let Err(e) = session.close().await {
        debug!(error = %e, "session close failed");
    }
}
