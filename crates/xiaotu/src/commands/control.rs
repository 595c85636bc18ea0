//! `unlock` / `lock` handlers.

use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::doors;

pub async fn handle(
    ctx: &Context,
    id: &str,
    locked: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Commands need the door in the registry first.
    ctx.coordinator.try_refresh().await?;
    ctx.coordinator.command(id, locked).await?;

    let door = ctx
        .coordinator
        .store()
        .get_device(id)
        .ok_or_else(|| CliError::NotFound {
            identifier: id.into(),
        })?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &door,
        |d| doors::detail(d, color),
        |d| doors::state_label(d, false),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
