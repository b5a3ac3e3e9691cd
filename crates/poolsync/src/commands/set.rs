//! `poolsync set`: validated control writes.

use serde::Serialize;

use poolsync_core::{ControlRequest, ControlTarget, DeviceSession, HeatPumpMode};

use crate::cli::{GlobalOpts, SetArgs, SetCommand};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Applied<'a> {
    #[serde(flatten)]
    request: &'a ControlRequest,
    previous: Option<String>,
}

pub async fn handle(
    session: &DeviceSession,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (target, value) = match args.command {
        SetCommand::ChlorinatorOutput { percent } => {
            (ControlTarget::ChlorinatorOutputPercent, percent)
        }
        SetCommand::HeatPumpMode { mode } => {
            (ControlTarget::HeatPumpMode, HeatPumpMode::from(mode).code())
        }
        SetCommand::Setpoint { degrees } => (ControlTarget::HeatPumpSetpoint, degrees),
    };

    // Commands are validated against the current equipment, so fetch it first.
    let snapshot = session.refresh().await?;
    let previous = snapshot
        .first_of_kind(target.kind())
        .and_then(|device| device.field(current_field(target)))
        .map(ToString::to_string);

    let request = session.send_command(target, value).await?;
    tracing::debug!(?request, "command sent");

    let applied = Applied {
        request: &request,
        previous,
    };
    let out = output::render_single(global.output, &applied, describe)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn current_field(target: ControlTarget) -> &'static str {
    match target {
        ControlTarget::ChlorinatorOutputPercent => poolsync_core::fields::OUTPUT_PERCENT,
        ControlTarget::HeatPumpMode => poolsync_core::fields::MODE,
        ControlTarget::HeatPumpSetpoint => poolsync_core::fields::SETPOINT,
    }
}

fn describe(applied: &Applied<'_>) -> String {
    let request = applied.request;
    let value = match request.target {
        ControlTarget::HeatPumpMode => HeatPumpMode::from_code(request.value)
            .map_or_else(|| request.value.to_string(), |mode| mode.to_string()),
        ControlTarget::ChlorinatorOutputPercent => format!("{}%", request.value),
        ControlTarget::HeatPumpSetpoint => request.value.to_string(),
    };
    match &applied.previous {
        Some(previous) => format!(
            "{} on slot {} set to {value} (was {previous})",
            request.target, request.slot
        ),
        None => format!("{} on slot {} set to {value}", request.target, request.slot),
    }
}
