// ── Bridge transport seams ──
//
// The connection and the pairing client talk to the bridge only through
// these traits. `LeapTransport` and `LeapPairing` are the production
// implementations on top of `caseta-api`; tests substitute scripted fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use caseta_api::leap::DeviceDefinition;
use caseta_api::{ClientIdentity, FanSpeed, LEAP_PORT, LeapClient, PAIRING_PORT, SigningResult};

use crate::config::{BridgeConfig, PairingIdentity};
use crate::error::CoreError;
use crate::model::{CredentialBundle, Device, Domain};

/// Opens authenticated sessions.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn open(
        &self,
        host: &str,
        bundle: &CredentialBundle,
    ) -> Result<Box<dyn BridgeSession>, CoreError>;
}

/// One open, authenticated session.
#[async_trait]
pub trait BridgeSession: Send {
    /// Every controllable device, with its current level where known.
    async fn devices(&mut self) -> Result<Vec<Device>, CoreError>;

    /// Drive `device` to `level` (0-100). On/off is level 100/0.
    async fn set_level(&mut self, device: Arc<Device>, level: u8) -> Result<(), CoreError>;

    async fn leap_version(&mut self) -> Result<String, CoreError>;

    async fn close(self: Box<Self>) -> Result<(), CoreError>;
}

/// Performs the certificate-signing exchange on the pairing channel.
#[async_trait]
pub trait PairingTransport: Send + Sync {
    /// Open the pairing channel, call `on_ready` once it is waiting for the
    /// button press, and return the signed material. Unbounded; the caller
    /// applies the pairing deadline.
    async fn request_certificate(
        &self,
        host: &str,
        csr_pem: &str,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> Result<SigningResult, CoreError>;
}

// ── LEAP implementations ─────────────────────────────────────────────

/// Mutual-TLS LEAP sessions on port 8081.
#[derive(Debug, Clone)]
pub struct LeapTransport {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl LeapTransport {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
        }
    }
}

#[async_trait]
impl BridgeTransport for LeapTransport {
    async fn open(
        &self,
        host: &str,
        bundle: &CredentialBundle,
    ) -> Result<Box<dyn BridgeSession>, CoreError> {
        let identity = ClientIdentity::from_pem(
            &bundle.client_cert,
            bundle.client_key.expose_secret().as_bytes(),
        )?;
        let tls = caseta_api::tls::authenticated_config(&bundle.ca_cert, identity)?;
        let mut client = LeapClient::connect(host, LEAP_PORT, tls, self.connect_timeout).await?;
        client.set_timeout(self.command_timeout);
        Ok(Box::new(LeapSession { client }))
    }
}

struct LeapSession {
    client: LeapClient,
}

#[async_trait]
impl BridgeSession for LeapSession {
    async fn devices(&mut self) -> Result<Vec<Device>, CoreError> {
        let definitions = self.client.list_devices().await?;
        let mut devices = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            let Some(device) = device_from_definition(definition) else {
                debug!(
                    device_type = %definition.device_type,
                    href = %definition.href,
                    "skipping uncontrolled device"
                );
                continue;
            };
            let level = match device.zone_id.as_deref() {
                Some(zone) => match self.client.zone_status(zone).await {
                    Ok(status) => status.level_percent(),
                    Err(e) if e.is_connection_loss() => return Err(e.into()),
                    Err(e) => {
                        debug!(zone, error = %e, "zone status unavailable");
                        None
                    }
                },
                None => None,
            };
            devices.push(device.with_level(level));
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(devices)
    }

    async fn set_level(&mut self, device: Arc<Device>, level: u8) -> Result<(), CoreError> {
        let zone = device
            .zone_id
            .as_deref()
            .ok_or_else(|| CoreError::Internal(format!("device {} has no zone", device.id)))?;
        if device.domain == Domain::Fan {
            self.client
                .go_to_fan_speed(zone, FanSpeed::from_level(level))
                .await?;
        } else {
            self.client.go_to_level(zone, level).await?;
        }
        Ok(())
    }

    async fn leap_version(&mut self) -> Result<String, CoreError> {
        Ok(self.client.ping().await?)
    }

    async fn close(self: Box<Self>) -> Result<(), CoreError> {
        Ok(self.client.close().await?)
    }
}

/// Translate a bridge device entry into the domain model.
fn device_from_definition(definition: &DeviceDefinition) -> Option<Device> {
    let domain = Domain::from_device_type(&definition.device_type)?;
    let id = definition.id()?;
    Some(Device::new(
        id,
        definition.display_name(),
        domain,
        definition.device_type.clone(),
        definition.zone_id().map(str::to_owned),
    ))
}

/// The certificate-signing exchange on port 8083.
#[derive(Debug, Clone)]
pub struct LeapPairing {
    connect_timeout: Duration,
    display_name: String,
    identity: Option<PairingIdentity>,
}

impl LeapPairing {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            display_name: config.display_name.clone(),
            identity: config.pairing_identity.clone(),
        }
    }
}

#[async_trait]
impl PairingTransport for LeapPairing {
    async fn request_certificate(
        &self,
        host: &str,
        csr_pem: &str,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> Result<SigningResult, CoreError> {
        let identity = self
            .identity
            .as_ref()
            .map(|id| ClientIdentity::from_pem(&id.cert_pem, id.key_pem.expose_secret().as_bytes()))
            .transpose()?;
        let tls = caseta_api::tls::pairing_config(identity)?;
        let mut client = LeapClient::connect(host, PAIRING_PORT, tls, self.connect_timeout)
            .await
            .map_err(pairing_error)?;

        on_ready();
        caseta_api::pairing::await_physical_access(&mut client)
            .await
            .map_err(pairing_error)?;
        let signed = caseta_api::pairing::exchange_csr(&mut client, csr_pem, &self.display_name)
            .await
            .map_err(pairing_error)?;

        if let Err(e) = client.close().await {
            debug!(error = %e, "pairing channel close failed");
        }
        Ok(signed)
    }
}

/// A refused or reset pairing channel means the bridge turned us away, not
/// that a session was lost.
fn pairing_error(err: caseta_api::Error) -> CoreError {
    if err.is_refused() {
        CoreError::PairingFailed {
            reason: format!("bridge refused the pairing connection: {err}"),
        }
    } else {
        err.into()
    }
}
