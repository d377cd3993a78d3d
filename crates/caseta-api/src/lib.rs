// caseta-api: Async Rust client for the Lutron LEAP protocol (Caseta Smart Bridge)

pub mod error;
pub mod leap;
pub mod pairing;
pub mod tls;

pub use error::Error;
pub use leap::{
    Communique, CommuniqueType, DeviceDefinition, FanSpeed, Header, Href, LeapClient, LeapStatus,
    ZoneStatus,
};
pub use pairing::SigningResult;
pub use tls::{ClientIdentity, LEAP_PORT, PAIRING_PORT};
