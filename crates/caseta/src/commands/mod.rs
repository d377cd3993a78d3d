//! Command dispatch: CLI args -> dispatcher tools -> output formatting.

pub mod devices;
pub mod pair;
pub mod serve;
pub mod status;
pub mod util;

use std::sync::Arc;

use caseta_core::CommandDispatcher;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    dispatcher: &Arc<CommandDispatcher>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Pair(args) => pair::handle(dispatcher, args, global).await,
        Command::Status(args) => status::handle(dispatcher, &args, global).await,
        Command::Devices(args) => devices::list(dispatcher, &args, global).await,
        Command::On(args) => devices::power(dispatcher, &args, true, global).await,
        Command::Off(args) => devices::power(dispatcher, &args, false, global).await,
        Command::Level(args) => devices::level(dispatcher, &args, global).await,
        Command::Serve => serve::handle(Arc::clone(dispatcher)).await,
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
