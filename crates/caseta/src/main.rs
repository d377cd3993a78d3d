mod cli;
mod commands;
mod error;
mod mcp;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use caseta_core::CommandDispatcher;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs always go to stderr; stdout carries command output or the
/// JSON-RPC stream.
fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "caseta", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let config = load_config(&cli.global)?;
            let dispatcher = Arc::new(CommandDispatcher::new(&config.to_bridge_config()?));

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &dispatcher, &cli.global).await;
            dispatcher.shutdown().await;
            result
        }
    }
}

/// Config file and environment, then CLI flag overrides.
fn load_config(global: &GlobalOpts) -> Result<caseta_config::Config, CliError> {
    let mut cfg = caseta_config::load_config()?;
    if let Some(ref ip) = global.bridge_ip {
        cfg.bridge_ip = Some(ip.clone());
    }
    if let Some(ref dir) = global.cert_dir {
        cfg.cert_dir = Some(dir.clone());
    }
    if let Some(secs) = global.timeout {
        cfg.command_timeout = secs;
    }
    Ok(cfg)
}
