use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn run_cli(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rosterlink"))
        .current_dir(repo)
        .args(args)
        .output()
        .expect("command runs")
}

fn run_json(repo: &Path, args: &[&str]) -> Value {
    let output = run_cli(repo, args);
    assert!(
        output.status.success(),
        "command failed: args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn run_error(repo: &Path, args: &[&str]) -> Value {
    let output = run_cli(repo, args);
    assert!(
        !output.status.success(),
        "command unexpectedly succeeded: args={args:?}\nstdout={}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .find(|line| line.starts_with('{'))
        .unwrap_or_else(|| panic!("no json error on stderr: {stderr}"));
    serde_json::from_str(line).expect("json stderr")
}

const SEEDS: &str = concat!(
    r#"{"ref_id":"2800360","jurisdiction":"ms","name":"Jackson Public School District"}"#,
    "\n",
    r#"{"ref_id":"2802940","jurisdiction":"ms","name":"Natchez-Adams School District"}"#,
    "\n",
    r#"{"ref_id":"2803480","jurisdiction":"ms","name":"Oxford School District"}"#,
    "\n",
    r#"{"ref_id":"2804620","jurisdiction":"ms","name":"Springfield School District"}"#,
    "\n",
    r#"{"ref_id":"2804650","jurisdiction":"ms","name":"West Springfield Schools"}"#,
    "\n",
    r#"{"ref_id":"2200001","jurisdiction":"la","name":"Acadia Parish Schools"}"#,
    "\n",
);

const ROSTER: &str = concat!(
    r#"{"jurisdiction":"ms","name":"Jackson Public Schools","admin_first_name":"Ada","admin_last_name":"Moore","email":"amoore@jackson.k12.ms.us"}"#,
    "\n",
    r#"{"jurisdiction":"ms","name":"Springfield Sch Dist","phone":"601-555-0142"}"#,
    "\n",
    r#"{"jurisdiction":"ms","name":"Atlantis Schools"}"#,
    "\n",
);

#[test]
fn load_reconciles_and_second_run_aborts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path();
    fs::write(repo.join("seeds.jsonl"), SEEDS).expect("seed file");
    fs::write(repo.join("roster.jsonl"), ROSTER).expect("roster file");

    let init = run_json(repo, &["init"]);
    assert_eq!(init["status"], "ok");

    let seeded = run_json(repo, &["seed", "--input", "seeds.jsonl"]);
    assert_eq!(seeded["seeded"], 6);
    assert_eq!(seeded["jurisdictions"], serde_json::json!(["la", "ms"]));

    let summary = run_json(
        repo,
        &["load", "--jurisdiction", "ms", "--input", "roster.jsonl"],
    );
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["incoming"], 3);
    assert_eq!(summary["loaded"], 3);
    assert_eq!(summary["matched"], 2);
    assert_eq!(summary["unmatched"], 1);
    assert_eq!(summary["errors"], 0);
    assert_eq!(summary["exact_name"], 1);
    assert_eq!(
        summary["unmatched_sample"],
        serde_json::json!(["Atlantis Schools"])
    );
    assert_eq!(summary["coverage_before"], 0.0);
    assert_eq!(summary["coverage_after"], 0.4);

    let second = run_json(
        repo,
        &["load", "--jurisdiction", "ms", "--input", "roster.jsonl"],
    );
    assert_eq!(second["status"], "aborted");
    assert_eq!(second["reason"], "already_loaded");
    assert_eq!(second["existing_records"], 3);

    let batches = run_json(repo, &["batches"]);
    let rows = batches["batches"].as_array().expect("batch list");
    assert_eq!(rows.len(), 1, "aborted run must not open a batch");
    assert_eq!(rows[0]["record_count"], 3);
    assert_eq!(rows[0]["success_count"], 3);
    assert_eq!(rows[0]["error_count"], 0);

    let batch_id = rows[0]["batch_id"].as_i64().expect("batch id").to_string();
    let shown = run_json(repo, &["show", batch_id.as_str()]);
    let records = shown["records"].as_array().expect("record list");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["matched"], true);
    assert_eq!(records[0]["method"], "exact_name");
    assert_eq!(records[0]["confidence"], 0.95);
    assert_eq!(records[1]["ref_id"], "2804620");
    assert_eq!(records[2]["matched"], false);
    assert_eq!(records[2]["ref_id"], Value::Null);
}

#[test]
fn load_is_scoped_to_one_jurisdiction() {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path();
    fs::write(repo.join("seeds.jsonl"), SEEDS).expect("seed file");
    fs::write(
        repo.join("roster.jsonl"),
        r#"{"jurisdiction":"la","name":"Acadia Parish"}"#,
    )
    .expect("roster file");

    let _ = run_json(repo, &["init"]);
    let _ = run_json(repo, &["seed", "--input", "seeds.jsonl"]);
    let summary = run_json(
        repo,
        &["load", "--jurisdiction", "la", "--input", "roster.jsonl"],
    );
    assert_eq!(summary["loaded"], 1);
    assert_eq!(summary["matched"], 1);
    assert_eq!(summary["exact_name"], 1);

    // the ms registry is untouched by the la run
    let ms_load = run_json(
        repo,
        &["load", "--jurisdiction", "ms", "--input", "roster.jsonl"],
    );
    assert_eq!(ms_load["status"], "ok");
    assert_eq!(ms_load["loaded"], 0);
    assert_eq!(ms_load["errors"], 1);
}

#[test]
fn match_command_is_a_dry_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path();
    fs::write(repo.join("seeds.jsonl"), SEEDS).expect("seed file");

    let _ = run_json(repo, &["init"]);
    let _ = run_json(repo, &["seed", "--input", "seeds.jsonl"]);

    let hit = run_json(
        repo,
        &[
            "match",
            "--jurisdiction",
            "ms",
            "--name",
            "Springfield Sch Dist",
        ],
    );
    assert_eq!(hit["matched"], true);
    assert_eq!(hit["ref_id"], "2804620");
    assert!(hit["score"].as_f64().expect("score") >= 0.80);

    let miss = run_json(
        repo,
        &["match", "--jurisdiction", "ms", "--name", "Atlantis Schools"],
    );
    assert_eq!(miss["matched"], false);

    // no batch was opened and nothing was persisted
    let batches = run_json(repo, &["batches"]);
    assert_eq!(batches["batches"].as_array().expect("list").len(), 0);
}

#[test]
fn commands_require_an_initialized_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = run_error(temp.path(), &["batches"]);
    assert_eq!(err["error"]["code"], "not_initialized");
}

#[test]
fn show_reports_unknown_batches() {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path();
    let _ = run_json(repo, &["init"]);
    let err = run_error(repo, &["show", "99"]);
    assert_eq!(err["error"]["code"], "batch_not_found");
}
