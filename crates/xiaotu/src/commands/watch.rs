//! `watch`: run the coordinator and report status and door changes until
//! Ctrl-C.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use xiaotu_core::{Device, UpdateStatus};

use crate::cli::GlobalOpts;
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::doors::state_label;

fn status_line(status: &UpdateStatus) -> String {
    match status {
        UpdateStatus::Pending => "pending".into(),
        UpdateStatus::Ok => "update ok".into(),
        UpdateStatus::Failed { reason } => format!("update failed, will retry: {reason}"),
        UpdateStatus::NeedsReauth { reason } => {
            format!("re-authentication required, polling paused: {reason}")
        }
    }
}

/// Lines describing what changed between two snapshots.
fn door_changes(
    seen: &mut HashMap<String, String>,
    doors: &[Arc<Device>],
    color: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = HashMap::with_capacity(doors.len());

    for door in doors {
        let state = state_label(door, color);
        match seen.get(&door.id) {
            None => lines.push(format!("{} ({}) appeared: {state}", door.name, door.id)),
            Some(previous) if *previous != state => {
                lines.push(format!("{} ({}): {state}", door.name, door.id));
            }
            Some(_) => {}
        }
        current.insert(door.id.clone(), state);
    }
    for id in seen.keys() {
        if !current.contains_key(id) {
            lines.push(format!("{id} removed"));
        }
    }

    *seen = current;
    lines
}

fn emit(line: &str, quiet: bool) {
    let stamp = Local::now().format("%H:%M:%S");
    output::print_output(&format!("[{stamp}] {line}"), quiet);
}

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let coordinator = &ctx.coordinator;
    let color = output::should_color(&global.color);

    let mut status_rx = coordinator.subscribe_status();
    let mut doors_rx = coordinator.store().subscribe();

    coordinator.start().await?;
    ctx.persist_session()?;

    let mut seen = HashMap::new();
    let mut last_status = status_rx.borrow_and_update().clone();
    emit(&status_line(&last_status), global.quiet);
    let snapshot = doors_rx.borrow_and_update().clone();
    for line in door_changes(&mut seen, &snapshot, color) {
        emit(&line, global.quiet);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Ok(()) = status_rx.changed() => {
                let status = status_rx.borrow_and_update().clone();
                if status != last_status {
                    emit(&status_line(&status), global.quiet);
                    if let Err(e) = ctx.persist_session() {
                        tracing::warn!(error = %e, "could not store session");
                    }
                    last_status = status;
                }
            }
            Ok(()) = doors_rx.changed() => {
                let snapshot = doors_rx.borrow_and_update().clone();
                for line in door_changes(&mut seen, &snapshot, color) {
                    emit(&line, global.quiet);
                }
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
