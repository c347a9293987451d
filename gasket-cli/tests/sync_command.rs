use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const PROJECT: &str = "1abcDEF";

fn gasket_cmd(remote: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gasket"));
    cmd.env("GASKET_REMOTE", remote).env_remove("GASKET_LOG");
    cmd
}

fn seed_remote(remote: &TempDir, files: &[(&str, &str, &str)]) {
    let records: Vec<String> = files
        .iter()
        .map(|(name, kind, source)| {
            format!(
                r#"{{"name": "{name}", "type": "{kind}", "source": {}, "updateTime": "2026-02-01T10:00:00Z"}}"#,
                serde_json::to_string(source).expect("encode source")
            )
        })
        .collect();
    let doc = format!(r#"{{"scriptId": "{PROJECT}", "files": [{}]}}"#, records.join(","));
    fs::write(remote.path().join(format!("{PROJECT}.json")), doc).expect("write remote doc");
}

fn init(local: &TempDir, remote: &TempDir) {
    gasket_cmd(remote.path())
        .args(["init"])
        .arg(local.path())
        .args(["--project-id", PROJECT])
        .assert()
        .success()
        .stdout(contains("Linked"));
}

#[test]
fn init_is_idempotent() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    init(&local, &remote);
    init(&local, &remote);
    assert!(local.path().join(".gasket/project.yaml").exists());
}

#[test]
fn sync_without_init_fails_with_hint() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .assert()
        .failure()
        .stderr(contains("gasket init"));
}

#[test]
fn pull_writes_files_and_manifest() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    seed_remote(
        &remote,
        &[
            ("Code", "SERVER_JS", "function main() {}\n"),
            ("sidebar", "HTML", "<p>hi</p>\n"),
        ],
    );
    init(&local, &remote);

    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .assert()
        .success()
        .stdout(contains("+2 ~0 -0, 2 total"));

    assert_eq!(
        fs::read_to_string(local.path().join("Code.js")).expect("Code.js"),
        "function main() {}\n"
    );
    assert!(local.path().join("sidebar.html").exists());
    assert!(local.path().join(".gasket/manifest.json").exists());

    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .assert()
        .success()
        .stdout(contains("No changes detected"));
}

#[test]
fn dry_run_reports_and_writes_nothing() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    seed_remote(&remote, &[("Code", "SERVER_JS", "x")]);
    init(&local, &remote);

    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("Code"));

    assert!(!local.path().join("Code.js").exists());
    assert!(!local.path().join(".gasket/manifest.json").exists());
}

#[test]
fn push_round_updates_remote_document() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    seed_remote(&remote, &[]);
    init(&local, &remote);
    fs::write(local.path().join("Code.js"), "function pushed() {}").expect("write");

    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .args(["--direction", "push", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""pushed": ["#))
        .stdout(contains(r#""success": true"#))
        .stdout(contains(r#""dryRun": false"#))
        .stdout(contains(r#""manifestSaved": true"#));

    let doc = fs::read_to_string(remote.path().join(format!("{PROJECT}.json"))).expect("doc");
    assert!(doc.contains("function pushed() {}"));
    assert!(doc.contains("SERVER_JS"));
}

#[test]
fn conflict_exits_non_zero() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    seed_remote(&remote, &[("Code", "SERVER_JS", "base")]);
    init(&local, &remote);
    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .assert()
        .success();

    fs::write(local.path().join("Code.js"), "mine").expect("local edit");
    seed_remote(&remote, &[("Code", "SERVER_JS", "theirs")]);

    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .args(["--direction", "bidirectional"])
        .assert()
        .failure()
        .stdout(contains("changed on both sides"))
        .stderr(contains("1 in conflict"));
}

#[test]
fn unknown_direction_is_rejected() {
    let local = TempDir::new().expect("local");
    let remote = TempDir::new().expect("remote");
    gasket_cmd(remote.path())
        .arg("sync")
        .arg(local.path())
        .args(["--direction", "sideways"])
        .assert()
        .failure()
        .stderr(contains("unknown sync direction"));
}
