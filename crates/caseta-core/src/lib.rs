//! Pairing and connection lifecycle for Lutron Caseta bridges.
//!
//! This crate owns everything between the LEAP wire client (`caseta-api`)
//! and the tool surface:
//!
//! - **[`CertificateStore`]**: Reads and atomically writes the three-file
//!   credential bundle (`caseta-bridge.crt`, `caseta.crt`, `caseta.key`).
//!
//! - **[`PairingClient`]**: The physical-button pairing ceremony: local key
//!   and CSR generation, a bounded wait for the button press, and
//!   persistence only after the bridge has signed.
//!
//! - **[`BridgeConnection`]**: One mutual-TLS session with observable
//!   [`ConnectionState`] and a typed command surface (list, on/off, level).
//!
//! - **[`DeviceRegistry`]**: Lock-free snapshot of the bridge's devices,
//!   replaced wholesale on refresh.
//!
//! - **[`CommandDispatcher`]**: The callable surface. Validates input and
//!   folds every outcome into a [`ToolResponse`].
//!
//! Bridge I/O goes through the [`transport`] traits so the whole lifecycle
//! can run against scripted fakes.

pub mod certs;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod pairing;
pub mod registry;
pub mod transport;
pub mod validation;

// ── Primary re-exports ──────────────────────────────────────────────
pub use certs::CertificateStore;
pub use config::{BridgeConfig, PairingIdentity};
pub use connection::{Action, BridgeConnection, CommandResult, ConnectionState};
pub use dispatcher::{CommandDispatcher, ConnectionReport, DeviceList, PairReport, ToolResponse};
pub use error::{CoreError, ErrorKind};
pub use model::{
    Capability, CertificatePaths, CertificateStatus, CredentialBundle, Device, Domain,
    PairingOutcome,
};
pub use pairing::{PairingClient, PairingSession};
pub use registry::DeviceRegistry;
pub use transport::{BridgeSession, BridgeTransport, LeapPairing, LeapTransport, PairingTransport};

// Signed material handed back by a `PairingTransport`.
pub use caseta_api::SigningResult;
