// SPDX-License-Identifier: MIT OR Apache-2.0
//! CLI integration tests for the `cc` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn cc() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("cc").expect("binary `cc` should be built")
}

#[test]
fn help_exits_zero_and_contains_expected_text() {
    cc().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connector execution core CLI"))
        .stdout(predicate::str::contains("execute"))
        .stdout(predicate::str::contains("metadata"))
        .stdout(predicate::str::contains("registry"));
}

#[test]
fn version_shows_version_string() {
    cc().arg("--version").assert().success().stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn registry_list_shows_builtin_connectors() {
    cc().args(["registry", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("google-sheets"))
        .stdout(predicate::str::contains("hubspot"));
}

#[test]
fn execute_unknown_operation_reports_failure_but_exits_zero() {
    cc().args(["execute", "doesNotExist"]).assert().success().stdout(predicate::str::contains("Unknown function handler"));
}

#[test]
fn execute_rejects_malformed_params_json() {
    cc().args(["execute", "ping", "--params", "not json"]).assert().failure();
}

#[test]
fn metadata_resolve_unknown_connector_reports_404() {
    cc().args(["metadata", "resolve", "not-a-connector"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": 404"));
}

#[test]
fn config_check_defaults_are_ok() {
    cc().args(["config", "check"]).assert().success().stdout(predicate::str::contains("config: ok"));
}

#[test]
fn config_check_reports_parse_error_for_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "not valid [toml =").unwrap();
    cc().args(["config", "check", path.to_str().unwrap()]).assert().success().stdout(predicate::str::contains("error:"));
}

#[test]
fn schema_config_prints_json_schema() {
    cc().args(["schema", "config"]).assert().success().stdout(predicate::str::contains("properties"));
}
