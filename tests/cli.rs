use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn parse_jsonl(stdout: &[u8]) -> Vec<Value> {
    let s = String::from_utf8_lossy(stdout);
    s.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).expect("valid jsonl line"))
        .collect()
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
    }
    let bytes = writer.finish().unwrap().into_inner();
    fs::write(path, bytes).unwrap();
}

fn codepack() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("codepack"));
    cmd.env_remove("CODEPACK_MODEL")
        .env_remove("CODEPACK_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn extract_filters_and_writes_artifact() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("demo.zip");
    write_zip(
        &archive,
        &[
            ("src/a.py", "x=1"),
            ("src/b.log", "noise"),
            (".git/config", "[core]"),
        ],
    );
    let out = temp.path().join("out");

    let assert = codepack()
        .arg("extract")
        .arg(&archive)
        .args(["--ext", ".py", "--exclude", ".git"])
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success();

    let items = parse_jsonl(&assert.get_output().stdout);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["path"], "src/a.py");
    assert_eq!(items[0]["status"], "ok");

    let summary = &items[1];
    assert_eq!(summary["kind"], "summary");
    assert_eq!(summary["matched_file_count"], 1);
    assert_eq!(summary["processed_file_count"], 1);
    assert_eq!(summary["artifact_name"], "demo_code_extract.txt");
    assert!(summary["token_count"]["tokens"].as_u64().unwrap() > 0);

    let artifact = fs::read_to_string(out.join("demo_code_extract.txt")).unwrap();
    assert_eq!(artifact, "\n========== File: src/a.py ==========\n\nx=1\n");
}

#[test]
fn extract_collapses_single_top_level_folder() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("proj.zip");
    write_zip(
        &archive,
        &[
            ("proj/", ""),
            ("proj/main.py", "print(1)"),
            ("proj/lib/util.py", "pass"),
        ],
    );

    codepack()
        .arg("--format")
        .arg("text")
        .arg("extract")
        .arg(&archive)
        .args(["--ext", "py", "--no-artifact"])
        .arg("--output-dir")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("========== File: lib/util.py =========="))
        .stdout(predicate::str::contains("========== File: main.py =========="))
        .stdout(predicate::str::contains("proj/").not());

    assert!(!temp.path().join("proj_code_extract.txt").exists());
}

#[test]
fn extract_with_no_matches_writes_nothing() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("docs.zip");
    write_zip(&archive, &[("notes.txt", "hello")]);

    let assert = codepack()
        .arg("--format")
        .arg("json")
        .arg("extract")
        .arg(&archive)
        .args(["--ext", "py"])
        .arg("--output-dir")
        .arg(temp.path())
        .assert()
        .success();

    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["matched_file_count"], 0);
    assert_eq!(report["processed_file_count"], 0);
    assert_eq!(report["token_count"]["tokens"], 0);
    assert!(!temp.path().join("docs_code_extract.txt").exists());
}

#[test]
fn extract_rejects_corrupt_archive() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("broken.zip");
    fs::write(&archive, "this is not a zip file").unwrap();

    codepack()
        .arg("extract")
        .arg(&archive)
        .arg("--no-artifact")
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.zip"));
}

#[test]
fn extract_rejects_missing_archive() {
    codepack()
        .arg("extract")
        .arg("/nonexistent/missing.zip")
        .assert()
        .failure();
}

#[test]
fn dir_counts_tokens_for_directory() {
    let temp = tempdir().unwrap();
    let project = temp.path().join("my-app");
    fs::create_dir_all(project.join("node_modules/pkg")).unwrap();
    fs::write(project.join("app.js"), "console.log('hi');\n").unwrap();
    fs::write(project.join("node_modules/pkg/index.js"), "x").unwrap();
    let out = temp.path().join("out");

    let assert = codepack()
        .arg("--format")
        .arg("json")
        .arg("dir")
        .arg(&project)
        .args(["--ext", "js", "--model", "gpt-4o"])
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success();

    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["matched_file_count"], 1);
    assert_eq!(report["records"][0]["path"], "app.js");
    assert_eq!(report["token_count"]["model"], "gpt-4o");
    assert!(out.join("my-app_code_extract.txt").exists());
}

#[test]
fn dir_with_unknown_model_approximates() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.py"), "abcdefgh").unwrap();

    let assert = codepack()
        .arg("--format")
        .arg("json")
        .arg("dir")
        .arg(temp.path())
        .args(["--ext", "py", "--model", "not-a-model", "--no-artifact"])
        .assert()
        .success();

    let report: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["token_count"]["method"], "approximate");
}

#[test]
fn dir_rejects_empty_extension_list() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("codepack.toml");
    fs::write(&config, "extensions = []\n").unwrap();

    codepack()
        .arg("dir")
        .arg(temp.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one file extension"));
}

#[test]
fn models_lists_profiles() {
    let assert = codepack().arg("models").assert().success();
    let items = parse_jsonl(&assert.get_output().stdout);

    let models: Vec<_> = items
        .iter()
        .map(|v| v["model"].as_str().unwrap().to_string())
        .collect();
    assert!(models.contains(&"gpt-4".to_string()));
    assert!(models.contains(&"gpt-4o".to_string()));

    let gpt4o = items.iter().find(|v| v["model"] == "gpt-4o").unwrap();
    assert_eq!(gpt4o["encoding"], "o200k_base");
}

#[test]
fn unknown_format_fails() {
    codepack()
        .args(["--format", "xml", "models"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}

#[test]
fn dir_run_twice_in_place_ignores_previous_artifact() {
    let temp = tempdir().unwrap();
    let project = temp.path().join("site");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("a.py"), "a = 1\n").unwrap();
    fs::write(project.join("README.txt"), "readme\n").unwrap();

    let run = || {
        let assert = codepack()
            .current_dir(&project)
            .args(["--format", "json", "dir", ".", "--ext", "py,txt"])
            .assert()
            .success();
        serde_json::from_slice::<Value>(&assert.get_output().stdout).unwrap()
    };

    let first = run();
    assert!(project.join("site_code_extract.txt").exists());
    let second = run();

    assert_eq!(first["matched_file_count"], 2);
    assert_eq!(second["matched_file_count"], 2);
    assert_eq!(first["token_count"]["tokens"], second["token_count"]["tokens"]);
}

#[test]
fn text_format_with_no_matches_prints_nothing() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("notes.md"), "hello").unwrap();

    codepack()
        .args(["--format", "text", "dir"])
        .arg(temp.path())
        .args(["--ext", "py", "--no-artifact"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
