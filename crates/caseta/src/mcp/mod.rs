//! Tool server: MCP-style JSON-RPC 2.0 over stdio.
//!
//! One request per line in, one response per line out. Requests are
//! handled in order; a pairing call holds the line until the bridge answers
//! or the pairing window closes. Logs go to stderr, never stdout.

pub mod protocol;
pub mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use caseta_core::{
    CommandDispatcher, CommandResult, CoreError, PairReport, ToolResponse,
};

use self::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpError, ToolResult,
    ToolsListResult,
};
use self::tools::{ToolCall, tool_definitions};

pub struct McpServer {
    dispatcher: Arc<CommandDispatcher>,
    config_file: Option<PathBuf>,
    initialized: bool,
}

impl McpServer {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            dispatcher,
            config_file: None,
            initialized: false,
        }
    }

    /// Record the bridge IP of every successful pairing in `path`.
    pub fn remember_pairings_in(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Serve until `reader` reaches end of input.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        info!("tool server starting");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line).await {
                let json = serde_json::to_string(&response)?;
                debug!(raw = %json, "sending response");
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("input closed; tool server stopping");
        Ok(())
    }

    /// Handle one raw line. `None` for notifications.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    serde_json::json!({ "expected": "2.0", "got": request.jsonrpc }),
                ),
            ));
        }

        debug!(method = %request.method, id = %request.id, "request");
        let is_notification = request.is_notification();
        let result = self.handle_request(&request).await;

        if is_notification {
            if let Err(e) = result {
                warn!(method = %request.method, error = %e, "notification handling failed");
            }
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        })
    }

    async fn handle_request(&mut self, request: &JsonRpcRequest) -> Result<Value, McpError> {
        match request.method.as_str() {
            "initialize" => {
                self.initialized = true;
                info!("client initialized");
                Ok(serde_json::to_value(InitializeResult::default())?)
            }
            "initialized" | "notifications/initialized" | "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(serde_json::to_value(ToolsListResult {
                tools: tool_definitions(),
            })?),
            "tools/call" => self.handle_tools_call(&request.params).await,
            other => Err(McpError::MethodNotFound(other.to_owned())),
        }
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;
        let call = ToolCall::parse(name, &params["arguments"])?;

        info!(tool = %name, "dispatching tool call");
        let result = self.call_tool(call).await?;
        if result.is_error {
            info!(tool = %name, "tool call reported failure");
        }
        Ok(serde_json::to_value(result)?)
    }

    async fn call_tool(&self, call: ToolCall) -> Result<ToolResult, McpError> {
        let d = &self.dispatcher;
        match call {
            ToolCall::PairBridge { host, output_dir } => {
                let response = d
                    .pair_bridge(&host, output_dir.as_deref().map(Path::new), &announce_button)
                    .await;
                if let Some(report) = response.payload() {
                    self.remember(report);
                }
                render(&response)
            }
            ToolCall::CheckConnection => render(&d.check_connection()),
            ToolCall::ListDevices { domain } => render(&d.list_devices(domain.as_deref()).await),
            ToolCall::TurnOn { device_id } => render(&d.turn_on(&device_id).await),
            ToolCall::TurnOff { device_id } => render(&d.turn_off(&device_id).await),
            ToolCall::SetLevel { device_id, level } => match level.as_i64() {
                Some(level) => render(&d.set_level(&device_id, level).await),
                None => render(&ToolResponse::<CommandResult>::failure(
                    &CoreError::invalid_argument(format!(
                        "Level must be a whole number between 0 and 100, got {level}"
                    )),
                )),
            },
        }
    }

    fn remember(&self, report: &PairReport) {
        let Some(path) = &self.config_file else {
            return;
        };
        if let Err(e) = caseta_config::remember_pairing(path, &report.bridge_ip, &report.cert_dir) {
            error!(error = %e, path = %path.display(), "could not record pairing");
        }
    }
}

fn announce_button() {
    info!("waiting for the button on the back of the bridge to be pressed");
}

/// The dispatcher's response, as a text block; `isError` mirrors `success`.
fn render<T: Serialize>(response: &ToolResponse<T>) -> Result<ToolResult, McpError> {
    let text = serde_json::to_string_pretty(response)?;
    Ok(ToolResult::text(text, !response.is_success()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use caseta_core::BridgeConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn server(cert_dir: &Path) -> McpServer {
        let config = BridgeConfig::new(cert_dir);
        McpServer::new(Arc::new(CommandDispatcher::new(&config)))
    }

    async fn call(server: &mut McpServer, request: &Value) -> Value {
        let response = server.handle_line(&request.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    async fn tool(server: &mut McpServer, name: &str, arguments: Value) -> (bool, Value) {
        let response = call(
            server,
            &json!({
                "jsonrpc": "2.0", "id": 7, "method": "tools/call",
                "params": { "name": name, "arguments": arguments }
            }),
        )
        .await;
        let result = &response["result"];
        let text = result["content"][0]["text"].as_str().unwrap();
        (
            result["isError"].as_bool().unwrap(),
            serde_json::from_str(text).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let response = call(
            &mut server,
            &json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        )
        .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "caseta");
        assert!(server.initialized);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let line = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(server.handle_line(&line.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let response = call(
            &mut server,
            &json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
        )
        .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_check_connection_before_pairing() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let (is_error, body) = tool(&mut server, "check_connection", json!({})).await;

        assert!(!is_error);
        assert_eq!(body["success"], true);
        assert_eq!(body["certificates_present"], false);
        assert_eq!(body["connected"], false);
        assert_eq!(body["bridge_ip"], Value::Null);
    }

    #[tokio::test]
    async fn test_level_out_of_range_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let (is_error, body) = tool(
            &mut server,
            "set_device_level",
            json!({ "device_id": "3", "level": 150 }),
        )
        .await;

        assert!(is_error);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_kind"], "InvalidArgument");
        assert_eq!(body["message"], "Level must be between 0 and 100, got 150");
    }

    #[tokio::test]
    async fn test_non_integer_levels_are_tool_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());

        for level in [json!(1e20), json!(u64::MAX), json!(50.5)] {
            let (is_error, body) = tool(
                &mut server,
                "set_device_level",
                json!({ "device_id": "3", "level": level.clone() }),
            )
            .await;

            assert!(is_error, "level {level}");
            assert_eq!(body["success"], false);
            assert_eq!(body["error_kind"], "InvalidArgument");
            assert!(body["message"].as_str().unwrap().starts_with("Level must be"));
        }
    }

    #[tokio::test]
    async fn test_commands_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let (is_error, body) = tool(&mut server, "turn_on_device", json!({ "device_id": "3" })).await;

        assert!(is_error);
        assert_eq!(body["error_kind"], "NotConnected");
    }

    #[tokio::test]
    async fn test_pair_rejects_hostname_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let (is_error, body) = tool(
            &mut server,
            "pair_bridge_tool",
            json!({ "host": "bridge.local" }),
        )
        .await;

        assert!(is_error);
        assert_eq!(body["error_kind"], "InvalidArgument");
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());

        let parse = server.handle_line("{not json").await.unwrap();
        assert_eq!(parse.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        let version = call(
            &mut server,
            &json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" }),
        )
        .await;
        assert_eq!(version["error"]["code"], JsonRpcError::INVALID_REQUEST);

        let method = call(
            &mut server,
            &json!({ "jsonrpc": "2.0", "id": 4, "method": "resources/list" }),
        )
        .await;
        assert_eq!(method["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);

        let unknown = call(
            &mut server,
            &json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": { "name": "dim_everything" }
            }),
        )
        .await;
        assert_eq!(unknown["error"]["code"], JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_run_streams_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(dir.path());
        let input = [
            json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string(),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
            String::new(),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }).to_string(),
        ]
        .join("\n");
        let mut output = Vec::new();

        server
            .run(tokio::io::BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["result"], json!({}));
        assert_eq!(lines[1]["id"], 2);
    }
}
