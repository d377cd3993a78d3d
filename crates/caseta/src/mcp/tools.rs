//! Tool catalogue and argument parsing.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Number, Value, json};

use super::protocol::{McpError, ToolDefinition};

// ── Definitions ──────────────────────────────────────────────────────

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "pair_bridge_tool",
            description: "Pair with a Lutron Caseta bridge. Press the small black button on \
                the back of the bridge when asked; the server then connects to it.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "host": {
                        "type": "string",
                        "description": "IP address of the bridge"
                    },
                    "output_dir": {
                        "type": "string",
                        "description": "Where to save the certificates; \".\" means the configured directory",
                        "default": "."
                    }
                },
                "required": ["host"]
            }),
        },
        ToolDefinition {
            name: "check_connection",
            description: "Report the bridge address, certificate files, and connection state",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "list_devices",
            description: "List all devices in the specified domain",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "domain": {
                        "type": "string",
                        "enum": ["light", "switch", "cover", "sensor", "fan"],
                        "default": "light"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "turn_on_device",
            description: "Turn on a device by ID",
            input_schema: device_schema(),
        },
        ToolDefinition {
            name: "turn_off_device",
            description: "Turn off a device by ID",
            input_schema: device_schema(),
        },
        ToolDefinition {
            name: "set_device_level",
            description: "Set device level (0-100) for dimmers, shades, and fans",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "device_id": { "type": "string" },
                    "level": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["device_id", "level"]
            }),
        },
    ]
}

fn device_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "device_id": { "type": "string" } },
        "required": ["device_id"]
    })
}

// ── Calls ────────────────────────────────────────────────────────────

/// A parsed `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    PairBridge {
        host: String,
        output_dir: Option<String>,
    },
    CheckConnection,
    ListDevices {
        domain: Option<String>,
    },
    TurnOn {
        device_id: String,
    },
    TurnOff {
        device_id: String,
    },
    /// `level` stays a raw JSON number so that fractional or oversized
    /// values reach the range check instead of failing to parse.
    SetLevel {
        device_id: String,
        level: Number,
    },
}

#[derive(Deserialize)]
struct PairArgs {
    host: String,
    #[serde(default)]
    output_dir: Option<String>,
}

#[derive(Deserialize)]
struct DomainArgs {
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Deserialize)]
struct DeviceArgs {
    #[serde(deserialize_with = "string_or_number")]
    device_id: String,
}

#[derive(Deserialize)]
struct LevelArgs {
    #[serde(deserialize_with = "string_or_number")]
    device_id: String,
    level: Number,
}

impl ToolCall {
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, McpError> {
        let call = match name {
            "pair_bridge_tool" => {
                let a: PairArgs = args(arguments)?;
                Self::PairBridge {
                    host: a.host,
                    output_dir: a.output_dir,
                }
            }
            "check_connection" => Self::CheckConnection,
            "list_devices" => Self::ListDevices {
                domain: args::<DomainArgs>(arguments)?.domain,
            },
            "turn_on_device" => Self::TurnOn {
                device_id: args::<DeviceArgs>(arguments)?.device_id,
            },
            "turn_off_device" => Self::TurnOff {
                device_id: args::<DeviceArgs>(arguments)?.device_id,
            },
            "set_device_level" => {
                let a: LevelArgs = args(arguments)?;
                Self::SetLevel {
                    device_id: a.device_id,
                    level: a.level,
                }
            }
            other => return Err(McpError::UnknownTool(other.to_owned())),
        };
        Ok(call)
    }
}

/// Missing `arguments` reads as an empty object.
fn args<T: DeserializeOwned>(arguments: &Value) -> Result<T, McpError> {
    let value = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// Device ids are strings on the bridge, but clients often send them as
/// numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
