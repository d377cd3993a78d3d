//! `caseta status`: the `check_connection` report.

use caseta_core::{CommandDispatcher, ConnectionReport};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    dispatcher: &CommandDispatcher,
    args: &StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.probe {
        // A failed probe still shows up in the report's state.
        if let Err(e) = util::connect(dispatcher).await {
            tracing::info!(error = %e, "probe connect failed");
        }
    }

    let report = util::into_result(dispatcher.check_connection())?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| r.state.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(r: &ConnectionReport, color: bool) -> String {
    [
        format!("Bridge IP:    {}", r.bridge_ip.as_deref().unwrap_or("-")),
        format!("Cert dir:     {}", r.cert_dir.display()),
        format!(
            "Certificates: ca {}, cert {}, key {}",
            output::yes_no(r.certificates.ca, color),
            output::yes_no(r.certificates.cert, color),
            output::yes_no(r.certificates.key, color),
        ),
        format!("Connection:   {}", output::state(&r.state, color)),
    ]
    .join("\n")
}
