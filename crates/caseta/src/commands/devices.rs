//! Device listing and control.

use tabled::Tabled;

use caseta_core::{CommandDispatcher, CommandResult, Device};

use crate::cli::{DeviceArgs, DevicesArgs, GlobalOpts, LevelArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Controls")]
    capabilities: String,
    #[tabled(rename = "Level")]
    level: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            device_type: d.device_type.clone(),
            capabilities: d
                .capabilities
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            level: d
                .last_known_level
                .map_or_else(|| "-".into(), |l| format!("{l}%")),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(
    dispatcher: &CommandDispatcher,
    args: &DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect(dispatcher).await?;
    let listing = util::into_result(dispatcher.list_devices(Some(&args.domain)).await)?;

    let out = output::render_list(
        &global.output,
        &listing.devices,
        |d| DeviceRow::from(d.as_ref()),
        |d| d.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn power(
    dispatcher: &CommandDispatcher,
    args: &DeviceArgs,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::connect(dispatcher).await?;
    let response = if on {
        dispatcher.turn_on(&args.device_id).await
    } else {
        dispatcher.turn_off(&args.device_id).await
    };
    report(&util::into_result(response)?, global)
}

pub async fn level(
    dispatcher: &CommandDispatcher,
    args: &LevelArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Range errors must not wait on a bridge connection.
    caseta_core::validation::validate_level(args.level)?;
    util::connect(dispatcher).await?;
    let response = dispatcher.set_level(&args.device_id, args.level).await;
    report(&util::into_result(response)?, global)
}

fn report(result: &CommandResult, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        result,
        |r| match r.level {
            Some(level) => format!("{} {}: level {level}", r.action, r.device_id),
            None => format!("{} {}", r.action, r.device_id),
        },
        |r| r.device_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
