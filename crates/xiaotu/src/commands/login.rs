//! `login`: validate the account and cache its session.

use secrecy::ExposeSecret;
use serde::Serialize;
use xiaotu_core::{UserInfo, account_title};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct LoginSummary {
    profile: String,
    title: String,
    doors: usize,
    user: UserInfo,
}

fn detail(s: &LoginSummary) -> String {
    let user = &s.user;
    [
        format!("Profile:  {}", s.profile),
        format!("Account:  {}", s.title),
        format!("Resident: {}", user.name.as_deref().unwrap_or("-")),
        format!("Mobile:   {}", user.mobile.as_deref().unwrap_or("-")),
        format!("Building: {}", user.building.as_deref().unwrap_or("-")),
        format!("Doors:    {}", s.doors),
    ]
    .join("\n")
}

pub async fn handle(ctx: &Context, args: &LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let account = ctx.coordinator.account();
    let user = account.get_user().await?;
    let doors = account.get_devices(true).await?;

    if args.store_client_id {
        let client_id = ctx.coordinator.config().client_id.expose_secret();
        xiaotu_config::store_client_id(&ctx.profile_name, client_id)?;
        tracing::info!(profile = %ctx.profile_name, "client id stored in keyring");
    }

    let summary = LoginSummary {
        profile: ctx.profile_name.clone(),
        title: account_title(&user),
        doors: doors.len(),
        user,
    };
    let out = output::render_single(&global.output, &summary, detail, |s| s.title.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
