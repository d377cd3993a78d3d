//! `caseta serve`: the stdio tool server.

use std::sync::Arc;

use tokio::io::BufReader;

use caseta_core::CommandDispatcher;

use crate::error::CliError;
use crate::mcp::McpServer;

pub async fn handle(dispatcher: Arc<CommandDispatcher>) -> Result<(), CliError> {
    // Startup connect failures leave the server up; tools report NotConnected
    // and `pair_bridge_tool` can fix the setup.
    match dispatcher.start().await {
        Ok(true) => tracing::info!("connected to bridge"),
        Ok(false) => tracing::warn!("bridge not configured; use pair_bridge_tool to pair"),
        Err(e) => tracing::error!(error = %e, "failed to connect to bridge"),
    }

    let mut server =
        McpServer::new(dispatcher).remember_pairings_in(caseta_config::config_path());
    server
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .map_err(|e| CliError::Internal {
            message: format!("tool server stopped: {e}"),
        })
}
