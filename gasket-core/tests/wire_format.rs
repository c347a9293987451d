//! Wire-format checks for the manifest document and remote file records.

use chrono::{TimeZone, Utc};
use gasket_core::{
    ContentHash, FileRecord, FileSyncEntry, FileType, ProjectId, SyncDirection, SyncManifest,
    MANIFEST_VERSION,
};
use rstest::rstest;

fn sample_manifest() -> SyncManifest {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut manifest = SyncManifest::new(ProjectId::from("proj-1"));
    manifest.last_sync_timestamp = Some(at);
    manifest.last_sync_direction = Some(SyncDirection::PullOnly);
    manifest.files.insert(
        "utils".to_string(),
        FileSyncEntry {
            content_hash: ContentHash::of("v1"),
            last_modified: at,
            synced_at: at,
        },
    );
    manifest
}

#[test]
fn manifest_uses_camel_case_field_names() {
    let json = serde_json::to_value(sample_manifest()).expect("serialize");
    let obj = json.as_object().expect("object");
    for key in ["version", "projectId", "lastSyncTimestamp", "lastSyncDirection", "files"] {
        assert!(obj.contains_key(key), "missing {key} in {json}");
    }
    assert_eq!(json["version"], MANIFEST_VERSION);
    assert_eq!(json["lastSyncDirection"], "pull-only");

    let entry = &json["files"]["utils"];
    assert_eq!(entry["contentHash"], ContentHash::of("v1").as_str());
    assert!(entry["lastModified"].is_string());
    assert!(entry["syncedAt"].is_string());
}

#[test]
fn manifest_parses_back_identically() {
    let manifest = sample_manifest();
    let text = serde_json::to_string_pretty(&manifest).expect("serialize");
    let back: SyncManifest = serde_json::from_str(&text).expect("parse");
    assert_eq!(back, manifest);
}

#[rstest]
#[case(FileType::ServerJs, "SERVER_JS")]
#[case(FileType::Html, "HTML")]
#[case(FileType::Json, "JSON")]
fn file_type_wire_names(#[case] ty: FileType, #[case] wire: &str) {
    assert_eq!(serde_json::to_value(ty).expect("serialize"), wire);
    assert_eq!(ty.as_str(), wire);
}

#[rstest]
#[case("", "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391")]
#[case("test", "30d74d258442c7c65512eafab474568dd706c430")]
#[case("hello world\n", "3b18e512dba79e4c8300dd08aeb37f8e728b8dad")]
fn content_hash_matches_git_hash_object(#[case] content: &str, #[case] expected: &str) {
    assert_eq!(ContentHash::of(content).as_str(), expected);
}

#[test]
fn file_record_rejects_unexpected_shapes() {
    let unknown_type = r#"{"name":"a","type":"PYTHON","source":"","updateTime":"2026-01-01T00:00:00Z"}"#;
    assert!(serde_json::from_str::<FileRecord>(unknown_type).is_err());

    let missing_source = r#"{"name":"a","type":"HTML","updateTime":"2026-01-01T00:00:00Z"}"#;
    assert!(serde_json::from_str::<FileRecord>(missing_source).is_err());

    let extra_field =
        r#"{"name":"a","type":"HTML","source":"","updateTime":"2026-01-01T00:00:00Z","x":1}"#;
    assert!(serde_json::from_str::<FileRecord>(extra_field).is_err());

    let ok = r#"{"name":"a","type":"HTML","source":"<p/>","updateTime":"2026-01-01T00:00:00Z"}"#;
    let record: FileRecord = serde_json::from_str(ok).expect("valid record");
    assert_eq!(record.file_type, FileType::Html);
}
