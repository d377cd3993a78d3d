#![allow(clippy::unwrap_used, dead_code)]
// Scripted bridge and pairing transports shared by the integration tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use caseta_core::{
    BridgeConfig, BridgeSession, BridgeTransport, CertificateStore, CommandDispatcher, CoreError,
    CredentialBundle, Device, Domain, PairingTransport, SigningResult,
};

pub const HOST: &str = "192.168.1.50";

// ── Bridge ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BridgeScript {
    pub devices: Mutex<Vec<Device>>,
    pub opens: AtomicUsize,
    pub device_reads: AtomicUsize,
    pub commands: Mutex<Vec<(String, u8)>>,
    pub refuse_connections: AtomicBool,
    pub drop_on_next_command: AtomicBool,
    pub hang_commands: AtomicBool,
}

#[derive(Clone, Default)]
pub struct FakeBridge {
    pub script: Arc<BridgeScript>,
}

impl FakeBridge {
    pub fn with_home() -> Self {
        let bridge = Self::default();
        *bridge.script.devices.lock().unwrap() = home_devices();
        bridge
    }

    pub fn commands(&self) -> Vec<(String, u8)> {
        self.script.commands.lock().unwrap().clone()
    }
}

pub fn home_devices() -> Vec<Device> {
    vec![
        Device::new("3", "Living Room Dimmer", Domain::Light, "WallDimmer", Some("1".into()))
            .with_level(Some(0)),
        Device::new("5", "Porch Light", Domain::Switch, "WallSwitch", Some("2".into()))
            .with_level(Some(100)),
        Device::new("7", "Bedroom Shade", Domain::Cover, "SerenaRollerShade", Some("3".into())),
        Device::new("9", "Kitchen Pico", Domain::Sensor, "Pico3ButtonRaiseLower", None),
    ]
}

#[async_trait]
impl BridgeTransport for FakeBridge {
    async fn open(
        &self,
        host: &str,
        _bundle: &CredentialBundle,
    ) -> Result<Box<dyn BridgeSession>, CoreError> {
        if self.script.refuse_connections.load(Ordering::SeqCst) {
            return Err(CoreError::ConnectionFailed {
                host: format!("{host}:8081"),
                reason: "Connection refused (os error 111)".into(),
            });
        }
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: Arc::clone(&self.script),
        }))
    }
}

struct FakeSession {
    script: Arc<BridgeScript>,
}

#[async_trait]
impl BridgeSession for FakeSession {
    async fn devices(&mut self) -> Result<Vec<Device>, CoreError> {
        self.script.device_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.devices.lock().unwrap().clone())
    }

    async fn set_level(&mut self, device: Arc<Device>, level: u8) -> Result<(), CoreError> {
        if self.script.hang_commands.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.script.drop_on_next_command.swap(false, Ordering::SeqCst) {
            return Err(CoreError::ConnectionLost {
                reason: "bridge closed the connection".into(),
            });
        }
        self.script
            .commands
            .lock()
            .unwrap()
            .push((device.id.clone(), level));
        Ok(())
    }

    async fn leap_version(&mut self) -> Result<String, CoreError> {
        Ok("1.123".into())
    }

    async fn close(self: Box<Self>) -> Result<(), CoreError> {
        Ok(())
    }
}

// ── Pairing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressBehavior {
    /// The user presses the button; the bridge signs.
    Press,
    /// Nobody presses the button.
    NeverPress,
    /// The bridge refuses the CSR.
    Reject,
}

pub struct FakePairing {
    pub behavior: PressBehavior,
    pub attempts: AtomicUsize,
}

impl FakePairing {
    pub fn new(behavior: PressBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            attempts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PairingTransport for FakePairing {
    async fn request_certificate(
        &self,
        _host: &str,
        csr_pem: &str,
        on_ready: &(dyn Fn() + Send + Sync),
    ) -> Result<SigningResult, CoreError> {
        assert!(csr_pem.contains("CERTIFICATE REQUEST"));
        self.attempts.fetch_add(1, Ordering::SeqCst);
        on_ready();
        match self.behavior {
            PressBehavior::Press => Ok(SigningResult {
                certificate: "-----BEGIN CERTIFICATE-----\nsigned\n-----END CERTIFICATE-----\n"
                    .into(),
                root_certificate:
                    "-----BEGIN CERTIFICATE-----\nbridge-ca\n-----END CERTIFICATE-----\n".into(),
            }),
            PressBehavior::NeverPress => std::future::pending().await,
            PressBehavior::Reject => Err(CoreError::PairingFailed {
                reason: "Pairing rejected by bridge: 401 Unauthorized".into(),
            }),
        }
    }
}

// ── Setup ───────────────────────────────────────────────────────────

pub fn config(cert_dir: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::new(cert_dir).with_host(HOST);
    config.pairing_timeout = Duration::from_secs(30);
    config.command_timeout = Duration::from_secs(10);
    config
}

pub fn dispatcher(
    cert_dir: &Path,
    bridge: &FakeBridge,
    pairing: &Arc<FakePairing>,
) -> CommandDispatcher {
    CommandDispatcher::with_transports(
        &config(cert_dir),
        Arc::new(bridge.clone()),
        Arc::clone(pairing) as Arc<dyn PairingTransport>,
    )
}

/// Put a complete bundle on disk, as a previous pairing would have.
pub fn write_bundle(cert_dir: &Path) {
    CertificateStore::new(cert_dir)
        .save(&CredentialBundle {
            ca_cert: b"CA".to_vec(),
            client_cert: b"CERT".to_vec(),
            client_key: SecretString::from("KEY"),
            directory: cert_dir.to_path_buf(),
        })
        .unwrap();
}

/// Dispatcher with an existing bundle, connected to a bridge with devices.
pub async fn connected(cert_dir: &Path) -> (CommandDispatcher, FakeBridge) {
    write_bundle(cert_dir);
    let bridge = FakeBridge::with_home();
    let dispatcher = dispatcher(cert_dir, &bridge, &FakePairing::new(PressBehavior::Press));
    dispatcher.connect().await.unwrap();
    (dispatcher, bridge)
}
