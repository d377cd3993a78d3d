//! `caseta pair`: the button-press ceremony, with a spinner.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use caseta_core::{CommandDispatcher, PairReport};

use crate::cli::{GlobalOpts, PairArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    dispatcher: &CommandDispatcher,
    args: PairArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let spinner = (!global.quiet).then(|| spinner(&format!("Contacting bridge at {}", args.host)));
    let window = dispatcher.pairing_timeout().as_secs();

    let on_ready = {
        let spinner = spinner.clone();
        move || {
            if let Some(pb) = &spinner {
                pb.set_message(format!(
                    "Press the small black button on the back of the bridge (you have {window}s)"
                ));
            }
        }
    };

    let response = dispatcher
        .pair_bridge(&args.host, args.output_dir.as_deref(), &on_ready)
        .await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let report = util::into_result(response)?;

    if !args.no_save {
        let path = caseta_config::config_path();
        caseta_config::remember_pairing(&path, &report.bridge_ip, &report.cert_dir)?;
        tracing::info!(path = %path.display(), "recorded bridge pairing");
    }

    let out = output::render_single(&global.output, &report, detail, |r| r.bridge_ip.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(r: &PairReport) -> String {
    let mut lines = vec![
        r.message.clone(),
        String::new(),
        format!("Bridge:      {}", r.bridge_ip),
        format!("CA cert:     {}", r.certificate_paths.ca_path.display()),
        format!("Client cert: {}", r.certificate_paths.cert_path.display()),
        format!("Client key:  {}", r.certificate_paths.key_path.display()),
    ];
    if let Some(ref version) = r.bridge_version {
        lines.push(format!("LEAP:        {version}"));
    }
    lines.join("\n")
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
