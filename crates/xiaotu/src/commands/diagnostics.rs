//! `diagnostics`: run one refresh with response capture on and dump the
//! anonymized responses.

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let log = ctx.coordinator.account().client().response_log();
    log.set_enabled(true);

    let user = ctx.coordinator.account().get_user().await.map(|_| ());
    let refresh = ctx.coordinator.try_refresh().await;

    let entries = log.entries();
    let out = match global.output {
        OutputFormat::JsonCompact => serde_json::to_string(&entries)?,
        OutputFormat::Plain => entries
            .iter()
            .map(|e| e.label.clone())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table | OutputFormat::Json => serde_json::to_string_pretty(&entries)?,
    };
    output::print_output(&out, global.quiet);

    user?;
    refresh?;
    Ok(())
}
