//! CLI integration tests for weave
//!
//! Tests the weave CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config, database and API keys
#[allow(deprecated)]
fn weave_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("weave").unwrap();
    cmd.current_dir(home.path())
        .env("WEAVE_CONFIG_DIR", home.path().join("config"))
        .env_remove("WEAVE_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn db_arg(home: &TempDir) -> String {
    home.path().join("graph.db").display().to_string()
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("link-stickies"));
}

#[test]
fn test_config_list_shows_defaults() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("traversal.forward_depth = 2"))
        .stdout(predicate::str::contains("llm.api_key = (not set"));
}

#[test]
fn test_config_set_then_get() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["config", "set", "traversal.forward_depth", "3"])
        .assert()
        .success();

    weave_cmd(&home)
        .args(["config", "get", "traversal.forward_depth"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn test_config_rejects_stored_api_key() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["config", "set", "llm.api_key", "sk-secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment variable"));
}

#[test]
fn test_query_on_empty_graph() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "query", "bug-login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No connected knowledge found."));
}

#[test]
fn test_query_json_on_empty_graph() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "--format", "json", "query", "bug-login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"searchResults\""));
}

#[test]
fn test_extract_sticky_without_api_key() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args([
            "--db",
            &db_arg(&home),
            "extract",
            "sticky",
            "--id",
            "s1",
            "--text",
            "Migrate to Postgres",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("sticky-s1"));

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes: 1"));
}

#[test]
fn test_link_stickies_creates_cards() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args([
            "--db",
            &db_arg(&home),
            "extract",
            "sticky",
            "--id",
            "s1",
            "--text",
            "Write onboarding guide",
        ])
        .assert()
        .success();

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "link-stickies"])
        .assert()
        .success()
        .stdout(predicate::str::contains("card-"))
        .stdout(predicate::str::contains("BECAME_TASK"));

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "query", "sticky-s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes (2):"));
}

#[test]
fn test_extract_chat_without_api_key_is_empty() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args([
            "--db",
            &db_arg(&home),
            "extract",
            "chat",
            "We need to fix the login bug by tomorrow's meeting.",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 0 nodes, 0 edges"));
}

#[test]
fn test_extract_calendar_rejects_empty_event_id() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args([
            "--db",
            &db_arg(&home),
            "extract",
            "calendar",
            "--event-id",
            "",
            "--title",
            "Sync",
            "--description",
            "Agenda\nEVENT_ID: evt-injected",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes: 0"));
}

#[test]
fn test_stats_on_empty_graph() {
    let home = TempDir::new().unwrap();

    weave_cmd(&home)
        .args(["--db", &db_arg(&home), "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes: 0"))
        .stdout(predicate::str::contains("Edges: 0"));
}
