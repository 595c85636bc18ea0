//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod control;
pub mod diagnostics;
pub mod doors;
pub mod login;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(ctx, &args, global).await,
        Command::Doors => doors::handle(ctx, global).await,
        Command::Unlock(args) => control::handle(ctx, &args.id, false, global).await,
        Command::Lock(args) => control::handle(ctx, &args.id, true, global).await,
        Command::Watch(_) => watch::handle(ctx, global).await,
        Command::Diagnostics => diagnostics::handle(ctx, global).await,
    }
}
