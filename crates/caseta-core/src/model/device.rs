// ── Device domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Device family, as exposed on the tool surface.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Domain {
    Light,
    Switch,
    Cover,
    Sensor,
    Fan,
}

impl Domain {
    pub const ALL: [Self; 5] = [
        Self::Light,
        Self::Switch,
        Self::Cover,
        Self::Sensor,
        Self::Fan,
    ];

    /// Operations every device of this domain accepts.
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Light | Self::Fan => &[Capability::OnOff, Capability::Level],
            Self::Switch => &[Capability::OnOff],
            Self::Cover => &[Capability::Level],
            Self::Sensor => &[],
        }
    }

    /// Map a bridge `DeviceType` to its domain. `None` for the bridge itself
    /// and for types this crate does not control.
    pub fn from_device_type(device_type: &str) -> Option<Self> {
        let domain = match device_type {
            "WallDimmer"
            | "PlugInDimmer"
            | "InLineDimmer"
            | "SunnataDimmer"
            | "TempInWallPaddleDimmer"
            | "WallDimmerWithPreset"
            | "Dimmed" => Self::Light,

            "WallSwitch"
            | "OutdoorPlugInSwitch"
            | "PlugInSwitch"
            | "InLineSwitch"
            | "PowPakSwitch"
            | "SunnataSwitch"
            | "TempInWallPaddleSwitch" => Self::Switch,

            "CasetaFanSpeedController" | "MaestroFanSpeedController" | "FanSpeed" => Self::Fan,

            "SerenaHoneycombShade"
            | "SerenaRollerShade"
            | "TriathlonHoneycombShade"
            | "TriathlonRollerShade"
            | "QsWirelessShade"
            | "QsWirelessHorizontalSheerBlind"
            | "WoodBlind"
            | "RightDrawDrape"
            | "Shade"
            | "SerenaTiltOnlyWoodBlind" => Self::Cover,

            "Pico1Button"
            | "Pico2Button"
            | "Pico2ButtonRaiseLower"
            | "Pico3Button"
            | "Pico3ButtonRaiseLower"
            | "Pico4Button"
            | "Pico4ButtonScene"
            | "Pico4ButtonZone"
            | "Pico4Button2Group"
            | "FourGroupRemote"
            | "SeeTouchTabletopKeypad"
            | "SeeTouchKeypad"
            | "SeeTouchHybridKeypad"
            | "SunnataKeypad"
            | "SunnataKeypad_2Button"
            | "SunnataKeypad_3ButtonRaiseLower"
            | "SunnataKeypad_4Button"
            | "SunnataHybridKeypad"
            | "HomeownerKeypad"
            | "GrafikTHybridKeypad"
            | "OccupancySensor"
            | "OccupancySensorVacancy" => Self::Sensor,

            _ => return None,
        };
        Some(domain)
    }
}

/// A controllable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    OnOff,
    Level,
}

/// A device known to the bridge.
///
/// `id` is the bridge's device id; commands are sent to `zone_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub domain: Domain,
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    pub capabilities: Vec<Capability>,
    pub last_known_level: Option<u8>,
}

impl Device {
    /// Build a device whose capabilities follow from its domain.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        domain: Domain,
        device_type: impl Into<String>,
        zone_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain,
            device_type: device_type.into(),
            zone_id,
            capabilities: domain.capabilities().to_vec(),
            last_known_level: None,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Copy of this device with `last_known_level` replaced.
    pub fn with_level(&self, level: Option<u8>) -> Self {
        Self {
            last_known_level: level,
            ..self.clone()
        }
    }
}
