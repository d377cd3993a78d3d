// ── Domain model ──
//
// Canonical types shared by the connection, the registry, and the
// dispatcher. LEAP wire types never leave `transport`.

pub mod credentials;
pub mod device;

pub use credentials::{
    CA_CERT_FILE, CLIENT_CERT_FILE, CLIENT_KEY_FILE, CertificatePaths, CertificateStatus,
    CredentialBundle, PairingOutcome,
};
pub use device::{Capability, Device, Domain};
