//! Shared helpers for command handlers.

use caseta_core::{CommandDispatcher, ToolResponse};

use crate::error::CliError;

/// Unwrap a tool response into its payload or a diagnostic error.
pub fn into_result<T>(response: ToolResponse<T>) -> Result<T, CliError> {
    match response {
        ToolResponse::Success { payload, .. } => Ok(payload),
        ToolResponse::Failure {
            error_kind,
            message,
            ..
        } => Err(CliError::from_kind(error_kind, message)),
    }
}

/// Connect when the bridge is configured and paired. An unconfigured bridge
/// is not an error here; the command itself reports `NotConnected`.
pub async fn connect(dispatcher: &CommandDispatcher) -> Result<(), CliError> {
    if dispatcher.start().await? {
        tracing::debug!("connected to bridge");
    }
    Ok(())
}
