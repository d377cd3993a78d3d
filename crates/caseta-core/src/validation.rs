// ── Input validation ──
//
// Checks applied before any network call.

use std::net::IpAddr;

use crate::error::CoreError;
use crate::model::Domain;

/// The host must be an IP literal; bridges are never addressed by name.
pub fn validate_host_ip(host: &str) -> Result<IpAddr, CoreError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(CoreError::invalid_argument("Bridge IP must not be empty"));
    }
    host.parse()
        .map_err(|_| CoreError::invalid_argument(format!("Invalid IP address: '{host}'")))
}

pub fn validate_domain(domain: &str) -> Result<Domain, CoreError> {
    let normalized = domain.trim().to_lowercase();
    normalized.parse().map_err(|_| {
        CoreError::invalid_argument(format!(
            "Invalid domain '{domain}'. Valid domains: {}",
            Domain::ALL.map(<&'static str>::from).join(", ")
        ))
    })
}

pub fn validate_level(level: i64) -> Result<u8, CoreError> {
    u8::try_from(level)
        .ok()
        .filter(|l| *l <= 100)
        .ok_or_else(|| {
            CoreError::invalid_argument(format!("Level must be between 0 and 100, got {level}"))
        })
}

pub fn validate_device_id(device_id: &str) -> Result<&str, CoreError> {
    let trimmed = device_id.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_argument("Device ID must not be empty"));
    }
    Ok(trimmed)
}
