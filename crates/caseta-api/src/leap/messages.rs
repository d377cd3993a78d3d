// LEAP wire types
//
// A LEAP "communique" is one JSON object per line. Requests carry a
// `CommuniqueType` and a `Header.Url`; responses echo the request's
// `ClientTag` and report a `Header.StatusCode` such as `"200 OK"`.
// Only the bodies this crate consumes are modelled; everything else stays
// as raw `serde_json::Value`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

/// The kind of a LEAP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommuniqueType {
    ReadRequest,
    CreateRequest,
    UpdateRequest,
    SubscribeRequest,
    ReadResponse,
    CreateResponse,
    UpdateResponse,
    SubscribeResponse,
    ExceptionResponse,
    #[serde(other)]
    Unknown,
}

/// A single LEAP message, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Communique {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communique_type: Option<CommuniqueType>,

    #[serde(default)]
    pub header: Header,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_body_type: Option<String>,

    /// Used instead of `CommuniqueType` on the pairing channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,

    /// Used instead of `MessageBodyType` on the pairing channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Communique {
    /// Build a `ReadRequest` for `url`.
    pub fn read(url: impl Into<String>) -> Self {
        Self {
            communique_type: Some(CommuniqueType::ReadRequest),
            header: Header {
                url: Some(url.into()),
                ..Header::default()
            },
            body: None,
        }
    }

    /// Build a `CreateRequest` for `url` carrying `body`.
    pub fn create(url: impl Into<String>, body: Value) -> Self {
        Self {
            communique_type: Some(CommuniqueType::CreateRequest),
            header: Header {
                url: Some(url.into()),
                ..Header::default()
            },
            body: Some(body),
        }
    }

    pub fn client_tag(&self) -> Option<&str> {
        self.header.client_tag.as_deref()
    }

    pub fn url(&self) -> &str {
        self.header.url.as_deref().unwrap_or("")
    }

    /// Parsed `Header.StatusCode`, if the message carries one.
    pub fn status(&self) -> Option<LeapStatus> {
        self.header.status_code.as_deref().and_then(LeapStatus::parse)
    }

    /// Fail with [`Error::Status`] unless the message reports a 2xx status.
    ///
    /// Messages without a status code (unsolicited events) pass.
    pub fn ensure_success(&self) -> Result<(), Error> {
        match self.status() {
            Some(status) if !status.is_success() => Err(Error::Status {
                url: self.url().to_owned(),
                status: status.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Deserialize the body into `T`.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| Error::UnexpectedResponse(format!("empty body for {}", self.url())))?;
        serde_json::from_value(body.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_string(),
        })
    }
}

// ── Status codes ────────────────────────────────────────────────────

/// A LEAP status line such as `"200 OK"` or `"404 NotFound"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeapStatus {
    pub code: u16,
    pub message: String,
}

impl LeapStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (code, message) = raw.split_once(' ').unwrap_or((raw, ""));
        Some(Self {
            code: code.parse().ok()?,
            message: message.to_owned(),
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Display for LeapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message)
        }
    }
}

// ── Bodies ──────────────────────────────────────────────────────────

/// A `{"href": "/zone/1"}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

impl Href {
    /// The trailing path segment, e.g. `"1"` for `/zone/1`.
    pub fn id(&self) -> Option<&str> {
        self.href.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// One entry of the bridge's `/device` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceDefinition {
    #[serde(rename = "href")]
    pub href: String,

    pub name: String,

    /// Area path plus device name, e.g. `["Living Room", "Lamp"]`.
    #[serde(default)]
    pub fully_qualified_name: Vec<String>,

    pub device_type: String,

    #[serde(default)]
    pub local_zones: Vec<Href>,

    #[serde(default)]
    pub serial_number: Option<u64>,

    #[serde(default)]
    pub model_number: Option<String>,
}

impl DeviceDefinition {
    /// Numeric device id taken from the href (`/device/5` → `5`).
    pub fn id(&self) -> Option<&str> {
        self.href.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// The first local zone, which is what level commands target.
    pub fn zone_id(&self) -> Option<&str> {
        self.local_zones.first().and_then(Href::id)
    }

    /// Human-friendly name including the area when the bridge reports one.
    pub fn display_name(&self) -> String {
        if self.fully_qualified_name.is_empty() {
            self.name.clone()
        } else {
            self.fully_qualified_name.join(" ")
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MultipleDeviceDefinition {
    #[serde(default)]
    pub devices: Vec<DeviceDefinition>,
}

/// Current output of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ZoneStatus {
    #[serde(default)]
    pub level: Option<i64>,

    /// `"On"` / `"Off"` for switched zones.
    #[serde(default)]
    pub switched_level: Option<String>,

    #[serde(default)]
    pub fan_speed: Option<String>,

    pub zone: Href,
}

impl ZoneStatus {
    /// Normalize the zone output into a 0-100 level.
    pub fn level_percent(&self) -> Option<u8> {
        if let Some(level) = self.level {
            return u8::try_from(level.clamp(0, 100)).ok();
        }
        if let Some(ref switched) = self.switched_level {
            return Some(if switched.eq_ignore_ascii_case("on") { 100 } else { 0 });
        }
        self.fan_speed
            .as_deref()
            .and_then(FanSpeed::from_name)
            .map(FanSpeed::to_level)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OneZoneStatus {
    pub zone_status: ZoneStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OnePingResponse {
    #[serde(rename = "PingResponse")]
    pub ping_response: PingResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PingResponse {
    #[serde(rename = "LEAPVersion")]
    pub leap_version: f64,
}

// ── Commands ────────────────────────────────────────────────────────

/// Discrete speeds understood by Caseta fan controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    MediumHigh,
    High,
}

impl FanSpeed {
    /// Bucket a 0-100 level into the nearest speed step.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Off,
            1..=25 => Self::Low,
            26..=50 => Self::Medium,
            51..=75 => Self::MediumHigh,
            _ => Self::High,
        }
    }

    pub fn to_level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::MediumHigh => 75,
            Self::High => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::MediumHigh => "MediumHigh",
            Self::High => "High",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Off" => Some(Self::Off),
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "MediumHigh" => Some(Self::MediumHigh),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

/// `GoToLevel` zone command body.
pub fn go_to_level_command(level: u8) -> Value {
    json!({
        "Command": {
            "CommandType": "GoToLevel",
            "Parameter": [{ "Type": "Level", "Value": level }]
        }
    })
}

/// `GoToFanSpeed` zone command body.
pub fn go_to_fan_speed_command(speed: FanSpeed) -> Value {
    json!({
        "Command": {
            "CommandType": "GoToFanSpeed",
            "FanSpeedParameters": { "FanSpeed": speed.as_str() }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_request_serializes_without_empty_fields() {
        let msg = Communique::read("/device");
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            wire,
            json!({ "CommuniqueType": "ReadRequest", "Header": { "Url": "/device" } })
        );
    }

    #[test]
    fn status_line_parses_code_and_message() {
        let status = LeapStatus::parse("204 NoContent").unwrap();
        assert_eq!(status.code, 204);
        assert_eq!(status.message, "NoContent");
        assert!(status.is_success());
        assert!(!LeapStatus::parse("404 NotFound").unwrap().is_success());
        assert!(LeapStatus::parse("garbage").is_none());
    }

    #[test]
    fn ensure_success_reports_url_and_status() {
        let msg: Communique = serde_json::from_value(json!({
            "CommuniqueType": "ExceptionResponse",
            "Header": { "StatusCode": "400 BadRequest", "Url": "/zone/9/commandprocessor" }
        }))
        .unwrap();
        let err = msg.ensure_success().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bridge returned 400 BadRequest for /zone/9/commandprocessor"
        );
    }

    #[test]
    fn unknown_communique_type_is_tolerated() {
        let msg: Communique = serde_json::from_value(json!({
            "CommuniqueType": "DeleteResponse",
            "Header": {}
        }))
        .unwrap();
        assert_eq!(msg.communique_type, Some(CommuniqueType::Unknown));
    }

    #[test]
    fn device_definition_ids_come_from_hrefs() {
        let device: DeviceDefinition = serde_json::from_value(json!({
            "href": "/device/5",
            "Name": "Lamp",
            "FullyQualifiedName": ["Living Room", "Lamp"],
            "DeviceType": "PlugInDimmer",
            "LocalZones": [{ "href": "/zone/2" }],
            "SerialNumber": 12_345_678
        }))
        .unwrap();
        assert_eq!(device.id(), Some("5"));
        assert_eq!(device.zone_id(), Some("2"));
        assert_eq!(device.display_name(), "Living Room Lamp");
    }

    #[test]
    fn zone_status_normalizes_level_sources() {
        let dimmed: ZoneStatus =
            serde_json::from_value(json!({ "Level": 42, "Zone": { "href": "/zone/1" } })).unwrap();
        assert_eq!(dimmed.level_percent(), Some(42));

        let switched: ZoneStatus = serde_json::from_value(
            json!({ "SwitchedLevel": "On", "Zone": { "href": "/zone/2" } }),
        )
        .unwrap();
        assert_eq!(switched.level_percent(), Some(100));

        let fan: ZoneStatus = serde_json::from_value(
            json!({ "FanSpeed": "Medium", "Zone": { "href": "/zone/3" } }),
        )
        .unwrap();
        assert_eq!(fan.level_percent(), Some(50));
    }

    #[test]
    fn fan_speed_buckets() {
        assert_eq!(FanSpeed::from_level(0), FanSpeed::Off);
        assert_eq!(FanSpeed::from_level(10), FanSpeed::Low);
        assert_eq!(FanSpeed::from_level(50), FanSpeed::Medium);
        assert_eq!(FanSpeed::from_level(70), FanSpeed::MediumHigh);
        assert_eq!(FanSpeed::from_level(100), FanSpeed::High);
    }

    #[test]
    fn go_to_level_body_shape() {
        assert_eq!(
            go_to_level_command(75),
            json!({
                "Command": {
                    "CommandType": "GoToLevel",
                    "Parameter": [{ "Type": "Level", "Value": 75 }]
                }
            })
        );
    }
}
