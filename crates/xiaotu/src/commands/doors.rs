//! Door listing.

use std::sync::Arc;

use tabled::Tabled;
use xiaotu_core::{Device, MotionState};

use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct DoorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "State")]
    state: String,
}

impl DoorRow {
    pub(crate) fn new(d: &Device, color: bool) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            address: d.address.clone().unwrap_or_default(),
            state: state_label(d, color),
        }
    }
}

/// Lock state, or the motion while a command is in flight.
pub(crate) fn state_label(d: &Device, color: bool) -> String {
    match d.motion {
        MotionState::Idle => output::lock_state(d.is_locked(), color),
        MotionState::Locking => "locking".into(),
        MotionState::Unlocking => "unlocking".into(),
    }
}

pub(crate) fn detail(d: &Device, color: bool) -> String {
    [
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name),
        format!("Address:  {}", d.address.as_deref().unwrap_or("-")),
        format!("Model:    {}", d.model.as_deref().unwrap_or("-")),
        format!("State:    {}", state_label(d, color)),
        format!("Updated:  {}", d.updated_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.coordinator.try_refresh().await?;

    let color = output::should_color(&global.color);
    let doors: Vec<Arc<Device>> = ctx.coordinator.devices_snapshot().to_vec();
    let out = output::render_list(
        &global.output,
        &doors,
        |d| DoorRow::new(d, color),
        |d| d.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
