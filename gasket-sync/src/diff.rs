//! Diff engine.
//!
//! [`compute`] turns a source and a destination snapshot into the add /
//! update / delete operations that make the destination match the source.
//! It is pure: no I/O, no clock, and the output is sorted by filename.
//!
//! A destination-only file is deleted only when the manifest says it was
//! synchronized before. On a bootstrap round nothing is ever deleted.
//! [`compute`] ignores the direction; whether a direction may delete at all
//! is decided by the round planner.
//!
//! [`plan_bidirectional`] is the three-way variant used when both sides may
//! have changed; the manifest entry is the common ancestor.

use std::collections::BTreeMap;

use serde::Serialize;
use similar::TextDiff;

use gasket_core::{
    ContentHash, DiffAction, DiffOperation, FileRecord, FileSnapshot, SyncDiffResult,
    SyncDirection, SyncManifest,
};

/// Inputs that gate destructive operations.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions<'a> {
    pub is_bootstrap: bool,
    pub direction: SyncDirection,
    pub manifest: Option<&'a SyncManifest>,
    /// Enable deletes for the directions that do not delete by default.
    pub reconcile: bool,
}

impl<'a> DiffOptions<'a> {
    /// `true` if the direction allows deletes at all.
    pub fn deletes_enabled(&self) -> bool {
        self.direction.deletes_by_default() || self.reconcile
    }

    /// `true` if `filename` passes the manifest gate: not a bootstrap round
    /// and tracked by the manifest.
    pub fn may_delete(&self, filename: &str) -> bool {
        !self.is_bootstrap && self.manifest.is_some_and(|m| m.is_tracked(filename))
    }

    fn baseline(&self, filename: &str) -> Option<&'a ContentHash> {
        if self.is_bootstrap {
            return None;
        }
        self.manifest.and_then(|m| m.baseline_hash(filename))
    }
}

/// Compute the operations that make `dest` match `source`.
///
/// Only the manifest gate applies to deletes; `options.direction` and
/// `options.reconcile` are not consulted.
pub fn compute(
    source: &[FileSnapshot],
    dest: &[FileSnapshot],
    options: &DiffOptions<'_>,
) -> SyncDiffResult {
    let source = index(source);
    let dest = index(dest);

    let mut add = Vec::new();
    let mut update = Vec::new();
    let mut delete = Vec::new();

    for (name, src) in &source {
        match dest.get(name) {
            None => add.push(write_op(src, DiffAction::Add)),
            Some(dst) if dst.content_hash != src.content_hash => {
                update.push(write_op(src, DiffAction::Update));
            }
            Some(_) => {}
        }
    }

    for (name, dst) in &dest {
        if source.contains_key(name) {
            continue;
        }
        if options.may_delete(name) {
            delete.push(delete_op(dst));
        } else {
            tracing::debug!("keeping untracked destination file '{name}'");
        }
    }

    SyncDiffResult::from_operations(add, update, delete)
}

// ---------------------------------------------------------------------------
// Bidirectional planning
// ---------------------------------------------------------------------------

/// A file changed on both sides since the last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub filename: String,
    pub local_hash: ContentHash,
    pub remote_hash: ContentHash,
    /// Hash both sides last agreed on; `None` if never synchronized.
    pub baseline_hash: Option<ContentHash>,
}

/// Result of [`plan_bidirectional`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BidirectionalPlan {
    /// Operations applied to the local working copy.
    pub pull: SyncDiffResult,
    /// Operations applied to the remote project.
    pub push: SyncDiffResult,
    pub conflicts: Vec<Conflict>,
}

/// Plan a round where either side may have changed.
///
/// Per filename, with `base` the manifest hash:
///
/// | local | remote | outcome                                                  |
/// |-------|--------|----------------------------------------------------------|
/// | L     | L      | nothing                                                  |
/// | base  | R      | pull update                                              |
/// | L     | base   | push update                                              |
/// | L     | R      | conflict                                                 |
/// | -     | R      | pull add, or push delete if `R == base` and deletes allowed |
/// | L     | -      | push add, or pull delete if `L == base` and deletes allowed |
///
/// Conflicts produce no operation; the caller reports them.
pub fn plan_bidirectional(
    local: &[FileSnapshot],
    remote: &[FileSnapshot],
    options: &DiffOptions<'_>,
) -> BidirectionalPlan {
    let local = index(local);
    let remote = index(remote);
    let deletes = options.deletes_enabled();

    let mut pull = Ops::default();
    let mut push = Ops::default();
    let mut conflicts = Vec::new();

    for (name, r) in &remote {
        let base = options.baseline(name);
        match local.get(name) {
            Some(l) if l.content_hash == r.content_hash => {}
            Some(l) if base == Some(&l.content_hash) => {
                pull.update.push(write_op(r, DiffAction::Update));
            }
            Some(l) if base == Some(&r.content_hash) => {
                push.update.push(write_op(l, DiffAction::Update));
            }
            Some(l) => conflicts.push(Conflict {
                filename: name.to_string(),
                local_hash: l.content_hash.clone(),
                remote_hash: r.content_hash.clone(),
                baseline_hash: base.cloned(),
            }),
            None if base == Some(&r.content_hash) && deletes && options.may_delete(name) => {
                push.delete.push(delete_op(r));
            }
            None => pull.add.push(write_op(r, DiffAction::Add)),
        }
    }

    for (name, l) in &local {
        if remote.contains_key(name) {
            continue;
        }
        if options.baseline(name) == Some(&l.content_hash) && deletes && options.may_delete(name) {
            pull.delete.push(delete_op(l));
        } else {
            push.add.push(write_op(l, DiffAction::Add));
        }
    }

    BidirectionalPlan {
        pull: pull.finish(),
        push: push.finish(),
        conflicts,
    }
}

#[derive(Default)]
struct Ops {
    add: Vec<DiffOperation>,
    update: Vec<DiffOperation>,
    delete: Vec<DiffOperation>,
}

impl Ops {
    fn finish(self) -> SyncDiffResult {
        SyncDiffResult::from_operations(self.add, self.update, self.delete)
    }
}

// ---------------------------------------------------------------------------
// Companions
// ---------------------------------------------------------------------------

/// Convert validated remote records into snapshots, sorted by filename.
pub fn from_remote_files(records: &[FileRecord]) -> Vec<FileSnapshot> {
    let mut snaps: Vec<FileSnapshot> = records
        .iter()
        .map(|r| FileSnapshot::new(&r.name, r.file_type, &r.source, r.update_time))
        .collect();
    snaps.sort_by(|a, b| a.filename.cmp(&b.filename));
    snaps
}

/// One-line summary: `"+A ~U -D, T total"` or `"No changes detected"`.
pub fn format_summary(diff: &SyncDiffResult) -> String {
    if !diff.has_changes {
        return "No changes detected".to_string();
    }
    format!(
        "+{} ~{} -{}, {} total",
        diff.add.len(),
        diff.update.len(),
        diff.delete.len(),
        diff.total_operations
    )
}

/// A unified diff for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    pub filename: String,
    pub unified_diff: String,
}

/// Unified diff from `old` to `new` with `a/` and `b/` headers.
pub fn unified_diff(filename: &str, old: &str, new: &str) -> FileDiff {
    let old_header = format!("a/{filename}");
    let new_header = format!("b/{filename}");
    let unified = TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    FileDiff {
        filename: filename.to_string(),
        unified_diff: unified,
    }
}

fn index(snaps: &[FileSnapshot]) -> BTreeMap<&str, &FileSnapshot> {
    snaps.iter().map(|s| (s.filename.as_str(), s)).collect()
}

fn write_op(src: &FileSnapshot, action: DiffAction) -> DiffOperation {
    DiffOperation {
        filename: src.filename.clone(),
        action,
        file_type: src.file_type,
        content: Some(src.content.clone()),
        content_hash: src.content_hash.clone(),
        last_modified: src.last_modified,
    }
}

fn delete_op(dst: &FileSnapshot) -> DiffOperation {
    DiffOperation {
        filename: dst.filename.clone(),
        action: DiffAction::Delete,
        file_type: dst.file_type,
        content: None,
        content_hash: dst.content_hash.clone(),
        last_modified: dst.last_modified,
    }
}
