//! Shared configuration for the Caseta binary.
//!
//! One TOML file plus `LUTRON_*` environment variables, layered with
//! `figment`, and translated to `caseta_core::BridgeConfig`. The CLI applies
//! its own flag overrides on top.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use caseta_core::config::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DISPLAY_NAME,
    DEFAULT_PAIRING_TIMEOUT,
};
use caseta_core::{BridgeConfig, PairingIdentity};

/// Application directory name, shared by the config file and the default
/// certificate directory.
pub const APP_DIR: &str = "lutron-caseta-mcp";

/// Prefix for environment overrides (`LUTRON_BRIDGE_IP`, `LUTRON_CERT_DIR`, ...).
pub const ENV_PREFIX: &str = "LUTRON_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level configuration. Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Bridge IP address; unset until the first pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_ip: Option<String>,

    /// Credential bundle directory. Defaults to `~/.config/lutron-caseta-mcp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_dir: Option<PathBuf>,

    #[serde(default = "default_pairing_timeout")]
    pub pairing_timeout: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Client name the bridge records at pairing time.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Client certificate presented on the pairing channel, for bridges
    /// that insist on one. Needs `pairing_key` too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_key: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_ip: None,
            cert_dir: None,
            pairing_timeout: default_pairing_timeout(),
            command_timeout: default_command_timeout(),
            connect_timeout: default_connect_timeout(),
            display_name: default_display_name(),
            pairing_cert: None,
            pairing_key: None,
        }
    }
}

fn default_pairing_timeout() -> u64 {
    DEFAULT_PAIRING_TIMEOUT.as_secs()
}
fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_secs()
}
fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}
fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.into()
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", APP_DIR).map_or_else(
        || home_dir().join(".config").join(APP_DIR).join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// `~/.config/lutron-caseta-mcp` on every platform, matching where existing
/// installs keep their certificates.
pub fn default_cert_dir() -> PathBuf {
    home_dir().join(".config").join(APP_DIR)
}

fn home_dir() -> PathBuf {
    BaseDirs::new().map_or_else(
        || PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into())),
        |dirs| dirs.home_dir().to_path_buf(),
    )
}

/// Check that a certificate directory resolves inside the home or temp
/// directory. Returns the absolute, normalized path.
pub fn validate_cert_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    let raw = dir.to_string_lossy();
    if raw.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "cert_dir".into(),
            reason: "Certificate directory cannot be empty".into(),
        });
    }

    let expanded = expand_home(dir);
    let resolved = resolve(&expanded).map_err(|_| ConfigError::Validation {
        field: "cert_dir".into(),
        reason: format!("Invalid certificate directory path: {}", dir.display()),
    })?;

    let home = canonical_or_self(&home_dir());
    let tmp = canonical_or_self(&std::env::temp_dir());
    if resolved.starts_with(&home) || resolved.starts_with(&tmp) {
        Ok(resolved)
    } else {
        Err(ConfigError::Validation {
            field: "cert_dir".into(),
            reason: format!(
                "Certificate directory must be within home directory or temp directory: {}",
                resolved.display()
            ),
        })
    }
}

/// The configured cert dir if it validates; otherwise a warning and the
/// default.
pub fn resolve_cert_dir(configured: Option<&Path>) -> PathBuf {
    let Some(dir) = configured else {
        return default_cert_dir();
    };
    match validate_cert_dir(dir) {
        Ok(dir) => dir,
        Err(e) => {
            let fallback = default_cert_dir();
            warn!(error = %e, fallback = %fallback.display(), "certificate directory rejected");
            fallback
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Absolute path with `.` and `..` folded away. Existing paths are also
/// canonicalized so symlinked temp dirs compare equal.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(canonical_or_self(&normalized))
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then `LUTRON_*` variables.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Persist a newly paired bridge into the file at `path`: its IP, and the
/// certificate directory when it differs from what the file resolves to.
///
/// Only the file's own contents are rewritten; values that came from the
/// environment are not copied into it.
pub fn remember_pairing(
    path: &Path,
    bridge_ip: &str,
    cert_dir: &Path,
) -> Result<(), ConfigError> {
    let mut file_config: Config = match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    file_config.bridge_ip = Some(bridge_ip.to_owned());
    let current = validate_cert_dir(&file_config.cert_dir()).ok();
    let paired = validate_cert_dir(cert_dir)?;
    if current.as_ref() != Some(&paired) {
        file_config.cert_dir = Some(paired);
    }
    save_config_to(path, &file_config)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Certificate directory after validation and fallback.
    pub fn cert_dir(&self) -> PathBuf {
        resolve_cert_dir(self.cert_dir.as_deref())
    }

    /// Build the core's `BridgeConfig`. Reads the optional pairing identity
    /// files; nothing else touches the filesystem.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let mut bridge = BridgeConfig::new(self.cert_dir());
        bridge.host = self
            .bridge_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_owned);
        bridge.pairing_timeout = seconds("pairing_timeout", self.pairing_timeout)?;
        bridge.command_timeout = seconds("command_timeout", self.command_timeout)?;
        bridge.connect_timeout = seconds("connect_timeout", self.connect_timeout)?;
        bridge.display_name.clone_from(&self.display_name);
        bridge.pairing_identity = self.pairing_identity()?;
        Ok(bridge)
    }

    fn pairing_identity(&self) -> Result<Option<PairingIdentity>, ConfigError> {
        match (&self.pairing_cert, &self.pairing_key) {
            (None, None) => Ok(None),
            (Some(cert), Some(key)) => Ok(Some(PairingIdentity {
                cert_pem: read(cert)?,
                key_pem: SecretString::from(
                    String::from_utf8(read(key)?).map_err(|_| ConfigError::Validation {
                        field: "pairing_key".into(),
                        reason: format!("{} is not valid PEM text", key.display()),
                    })?,
                ),
            })),
            _ => Err(ConfigError::Validation {
                field: "pairing_cert".into(),
                reason: "pairing_cert and pairing_key must be set together".into(),
            }),
        }
    }
}

fn seconds(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn read(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config: Config = figment_for(&jail.directory().join("missing.toml")).extract()?;
            assert_eq!(config, Config::default());
            assert_eq!(config.pairing_timeout, 30);
            assert_eq!(config.display_name, "caseta-mcp");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "config.toml",
                r#"
                bridge_ip = "192.168.1.10"
                command_timeout = 5
                "#,
            )?;
            jail.set_env("LUTRON_BRIDGE_IP", "192.168.1.50");
            jail.set_env("LUTRON_PAIRING_TIMEOUT", "45");

            let config: Config = figment_for(&jail.directory().join("config.toml")).extract()?;
            assert_eq!(config.bridge_ip.as_deref(), Some("192.168.1.50"));
            assert_eq!(config.pairing_timeout, 45);
            assert_eq!(config.command_timeout, 5);
            Ok(())
        });
    }

    #[test]
    fn cert_dir_inside_temp_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("certs").join("..").join("bundle");
        let resolved = validate_cert_dir(&nested).unwrap();
        assert!(resolved.ends_with("bundle"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }

    #[test]
    fn cert_dir_outside_safe_roots_falls_back() {
        let err = validate_cert_dir(Path::new("/etc/caseta")).unwrap_err();
        assert!(err.to_string().contains("home directory or temp directory"));
        assert_eq!(
            resolve_cert_dir(Some(Path::new("/etc/caseta"))),
            default_cert_dir()
        );
    }

    #[test]
    fn empty_cert_dir_is_rejected() {
        let err = validate_cert_dir(Path::new("  ")).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let resolved = validate_cert_dir(Path::new("~/caseta-certs")).unwrap();
        assert!(resolved.ends_with("caseta-certs"));
        assert!(resolved.starts_with(canonical_or_self(&home_dir())));
    }

    #[test]
    fn translates_to_bridge_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            bridge_ip: Some(" 192.168.1.50 ".into()),
            cert_dir: Some(dir.path().to_path_buf()),
            command_timeout: 3,
            ..Config::default()
        };
        let bridge = config.to_bridge_config().unwrap();
        assert_eq!(bridge.host.as_deref(), Some("192.168.1.50"));
        assert_eq!(bridge.cert_dir, canonical_or_self(dir.path()));
        assert_eq!(bridge.command_timeout, Duration::from_secs(3));
        assert!(bridge.pairing_identity.is_none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = Config {
            connect_timeout: 0,
            ..Config::default()
        };
        let err = config.to_bridge_config().unwrap_err();
        assert!(err.to_string().contains("connect_timeout"));
    }

    #[test]
    fn pairing_identity_needs_both_halves() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("id.crt");
        std::fs::write(&cert, "CERT").unwrap();
        let half = Config {
            cert_dir: Some(dir.path().to_path_buf()),
            pairing_cert: Some(cert.clone()),
            ..Config::default()
        };
        assert!(half.to_bridge_config().is_err());

        let key = dir.path().join("id.key");
        std::fs::write(&key, "KEY").unwrap();
        let full = Config {
            pairing_key: Some(key),
            ..half
        };
        let identity = full.to_bridge_config().unwrap().pairing_identity.unwrap();
        assert_eq!(identity.cert_pem, b"CERT");
    }

    #[test]
    fn remember_pairing_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "command_timeout = 4\n").unwrap();

        remember_pairing(&path, "192.168.1.77", &default_cert_dir()).unwrap();

        let saved: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.bridge_ip.as_deref(), Some("192.168.1.77"));
        assert_eq!(saved.command_timeout, 4);
        assert_eq!(saved.cert_dir, None);
    }

    #[test]
    fn remember_pairing_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        remember_pairing(&path, "10.0.0.2", &default_cert_dir()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("bridge_ip = \"10.0.0.2\""));
        assert!(!text.contains("cert_dir"));
    }

    #[test]
    fn remember_pairing_records_other_cert_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let certs = dir.path().join("certs");
        std::fs::create_dir_all(&certs).unwrap();

        remember_pairing(&path, "10.0.0.3", &certs).unwrap();
        // Already recorded; a second pairing into the same place is a no-op.
        remember_pairing(&path, "10.0.0.3", &certs).unwrap();

        let saved: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(saved.cert_dir.unwrap().ends_with("certs"));
    }
}
