//! Integration tests for the `xiaotu` CLI binary.
//!
//! Argument parsing and error handling run offline; the account-bound
//! commands talk to a wiremock stand-in for the vendor backend.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::process::Output;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `xiaotu` binary with env isolation.
///
/// Clears all `XIAOTU_*` env vars and points config directories at
/// `config_home` so tests never touch the user's real configuration.
fn xiaotu_cmd(config_home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("xiaotu");
    cmd.env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("XIAOTU_PROFILE")
        .env_remove("XIAOTU_HOST")
        .env_remove("XIAOTU_OPENID")
        .env_remove("XIAOTU_CLIENT_ID")
        .env_remove("XIAOTU_OUTPUT")
        .env_remove("XIAOTU_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Same, with the account given entirely through flags.
fn account_cmd(config_home: &Path, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = xiaotu_cmd(config_home);
    cmd.args([
        "--host",
        &server.uri(),
        "--openid",
        "wx-openid",
        "--client-id",
        "client-secret",
        "--color",
        "never",
    ]);
    cmd
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/userClient/clientV2/loginByOpenId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": { "tokenId": token }
        })))
        .mount(server)
        .await;
}

async fn mount_doors(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/wap/door/getDoor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": [
                { "id": "D1", "doorType": "door", "status": "1", "name": "North Gate", "isOpen": 0 },
                { "id": "D9", "doorType": "gate", "status": "3", "name": "Retired" }
            ]
        })))
        .mount(server)
        .await;
}

// ── Offline ─────────────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = xiaotu_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    xiaotu_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("doors")
            .and(predicate::str::contains("unlock"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_missing_config_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = xiaotu_cmd(home.path()).arg("doors").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("Configuration file not found"),
        "unexpected output:\n{text}"
    );
}

// ── Against a mock backend ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_doors_lists_only_controllable_doors() {
    let server = MockServer::start().await;
    mount_login(&server, "T1").await;
    mount_doors(&server).await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = account_cmd(home.path(), &server);
    cmd.args(["doors", "-o", "json"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let doors: Value = serde_json::from_slice(&output.stdout).unwrap();
    let doors = doors.as_array().unwrap();
    assert_eq!(doors.len(), 1);
    assert_eq!(doors[0]["id"], "D1");
    assert_eq!(doors[0]["kind"], "lock");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unlock_calls_open_door() {
    let server = MockServer::start().await;
    mount_login(&server, "T1").await;
    mount_doors(&server).await;
    Mock::given(method("GET"))
        .and(path("/wap/door/openDoor"))
        .and(query_param("doorId", "D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = account_cmd(home.path(), &server);
    cmd.args(["unlock", "d1", "-o", "plain"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_door_exits_not_found() {
    let server = MockServer::start().await;
    mount_login(&server, "T1").await;
    mount_doors(&server).await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = account_cmd(home.path(), &server);
    cmd.args(["unlock", "nope"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_login_exits_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/userClient/clientV2/loginByOpenId"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let mut cmd = account_cmd(home.path(), &server);
    cmd.arg("doors");
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_stores_session_in_profile() {
    let server = MockServer::start().await;
    mount_login(&server, "T-STORED").await;
    mount_doors(&server).await;
    Mock::given(method("POST"))
        .and(path("/userClient/cuserV2/getUserInfoV2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": { "userId": 7, "villageName": "Sunrise Gardens" }
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let config_file = home.path().join("xiaotu").join("config.toml");
    std::fs::create_dir_all(config_file.parent().unwrap()).unwrap();
    std::fs::write(
        &config_file,
        format!(
            "default_profile = \"home\"\n\n[profiles.home]\nhost = \"{}\"\nopenid = \"wx-openid\"\nclient_id = \"client-secret\"\n",
            server.uri()
        ),
    )
    .unwrap();

    let mut cmd = xiaotu_cmd(home.path());
    cmd.args(["login", "-o", "plain"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("XiaoTu Door - Sunrise Gardens"));

    let stored = std::fs::read_to_string(&config_file).unwrap();
    assert!(stored.contains("T-STORED"), "session not stored:\n{stored}");
}
