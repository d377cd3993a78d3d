// LEAP: newline-delimited JSON messages over a TLS stream.

pub mod client;
pub mod messages;

pub use client::{LeapClient, LeapStream};
pub use messages::{
    Communique, CommuniqueType, DeviceDefinition, FanSpeed, Header, Href, LeapStatus, ZoneStatus,
};
