//! Behavioural smoke tests for the provider binary.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use terraform_provider_fluence::plugin::{MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE};

#[test]
fn schema_subcommand_prints_every_type() {
    let mut cmd = cargo_bin_cmd!("terraform-provider-fluence");
    cmd.env("FLUENCE_LOG", "off")
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fluence_vm\""))
        .stdout(predicate::str::contains("\"fluence_vm_estimate_deposit\""))
        .stderr("");
}

#[test]
fn direct_execution_is_refused() {
    let mut cmd = cargo_bin_cmd!("terraform-provider-fluence");
    cmd.env("FLUENCE_LOG", "off")
        .env_remove(MAGIC_COOKIE_KEY)
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("This binary is a plugin"));
}

#[test]
fn old_protocol_versions_are_refused() {
    let mut cmd = cargo_bin_cmd!("terraform-provider-fluence");
    cmd.env("FLUENCE_LOG", "off")
        .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
        .env("PLUGIN_PROTOCOL_VERSIONS", "4,5")
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Plugin version: 6, Client versions: 4,5",
        ));
}

#[test]
fn serve_prints_the_plugin_handshake() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_terraform-provider-fluence"))
        .env("FLUENCE_LOG", "off")
        .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
        .env("PLUGIN_PROTOCOL_VERSIONS", "5,6")
        .env_remove("PLUGIN_CLIENT_CERT")
        .env_remove("PLUGIN_MIN_PORT")
        .env_remove("PLUGIN_MAX_PORT")
        .env_remove("FLUENCE_API_KEY")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap_or_else(|err| panic!("spawn: {err}"));

    let mut line = String::new();
    let read = child
        .stdout
        .take()
        .map(|stdout| BufReader::new(stdout).read_line(&mut line));
    child.kill().ok();
    child.wait().ok();

    assert!(matches!(read, Some(Ok(n)) if n > 0), "no handshake: {read:?}");
    assert!(line.starts_with("1|6|tcp|127.0.0.1:"), "{line}");
    assert!(line.trim_end().ends_with("|grpc|"), "{line}");
}

#[test]
fn unknown_subcommand_fails() {
    let mut cmd = cargo_bin_cmd!("terraform-provider-fluence");
    cmd.arg("launch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
