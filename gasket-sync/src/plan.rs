//! Turns two snapshots and a manifest into the work of one round.

use std::collections::{BTreeMap, BTreeSet};

use gasket_core::{FileSnapshot, SyncDiffResult, SyncDirection, SyncManifest};

use crate::diff::{self, Conflict, DiffOptions};

/// Everything the executor needs to apply one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    pub direction: SyncDirection,
    pub is_bootstrap: bool,
    /// Operations applied to the local working copy.
    pub pull: SyncDiffResult,
    /// Operations applied to the remote project.
    pub push: SyncDiffResult,
    pub conflicts: Vec<Conflict>,
    /// Files already identical on both sides.
    pub in_sync: Vec<FileSnapshot>,
    /// Every filename present on either side.
    pub present: BTreeSet<String>,
}

impl RoundPlan {
    pub fn total_operations(&self) -> usize {
        self.pull.total_operations + self.push.total_operations
    }

    pub fn has_changes(&self) -> bool {
        self.pull.has_changes || self.push.has_changes
    }

    /// `"+A ~U -D, T total"` for single-leg rounds, both legs otherwise.
    pub fn summary(&self) -> String {
        match self.direction {
            SyncDirection::Pull | SyncDirection::PullOnly => diff::format_summary(&self.pull),
            SyncDirection::Push | SyncDirection::PushOnly => diff::format_summary(&self.push),
            SyncDirection::Bidirectional if !self.has_changes() => {
                diff::format_summary(&self.pull)
            }
            SyncDirection::Bidirectional => format!(
                "pull {}; push {}",
                diff::format_summary(&self.pull),
                diff::format_summary(&self.push)
            ),
        }
    }
}

/// Plan a round in `direction`.
///
/// `pull`/`pull-only` make local match remote, `push`/`push-only` the
/// reverse, and `bidirectional` uses the three-way planner.
pub fn plan_round(
    direction: SyncDirection,
    local: &[FileSnapshot],
    remote: &[FileSnapshot],
    manifest: Option<&SyncManifest>,
    is_bootstrap: bool,
    reconcile: bool,
) -> RoundPlan {
    let options = DiffOptions {
        is_bootstrap,
        direction,
        manifest,
        reconcile,
    };

    let (pull, push, conflicts) = match direction {
        SyncDirection::Pull | SyncDirection::PullOnly => (
            gate_deletes(diff::compute(remote, local, &options), &options),
            SyncDiffResult::default(),
            Vec::new(),
        ),
        SyncDirection::Push | SyncDirection::PushOnly => (
            SyncDiffResult::default(),
            gate_deletes(diff::compute(local, remote, &options), &options),
            Vec::new(),
        ),
        SyncDirection::Bidirectional => {
            let plan = diff::plan_bidirectional(local, remote, &options);
            (plan.pull, plan.push, plan.conflicts)
        }
    };

    let remote_hashes: BTreeMap<&str, &FileSnapshot> =
        remote.iter().map(|s| (s.filename.as_str(), s)).collect();
    let in_sync = local
        .iter()
        .filter(|l| {
            remote_hashes
                .get(l.filename.as_str())
                .is_some_and(|r| r.content_hash == l.content_hash)
        })
        .cloned()
        .collect();
    let present = local
        .iter()
        .chain(remote.iter())
        .map(|s| s.filename.clone())
        .collect();

    RoundPlan {
        direction,
        is_bootstrap,
        pull,
        push,
        conflicts,
        in_sync,
        present,
    }
}

/// Drop the deletes of a single-leg diff when the direction does not delete.
fn gate_deletes(diff: SyncDiffResult, options: &DiffOptions<'_>) -> SyncDiffResult {
    if options.deletes_enabled() || diff.delete.is_empty() {
        return diff;
    }
    tracing::debug!(
        "{}: skipping {} delete(s) without reconcile",
        options.direction,
        diff.delete.len()
    );
    SyncDiffResult::from_operations(diff.add, diff.update, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gasket_core::{ContentHash, FileSyncEntry, FileType, ProjectId};
    use rstest::rstest;

    fn snap(name: &str, content: &str) -> FileSnapshot {
        FileSnapshot::new(name, FileType::Html, content, Utc::now())
    }

    #[test]
    fn pull_plan_only_touches_local() {
        let local = [snap("same", "x"), snap("stale", "1")];
        let remote = [snap("same", "x"), snap("stale", "2"), snap("new", "n")];
        let plan = plan_round(SyncDirection::Pull, &local, &remote, None, true, false);

        assert!(plan.push.is_empty());
        assert_eq!(plan.pull.add.len(), 1);
        assert_eq!(plan.pull.update.len(), 1);
        assert_eq!(plan.in_sync.len(), 1);
        assert_eq!(plan.in_sync[0].filename, "same");
        assert_eq!(plan.present.len(), 3);
        assert_eq!(plan.summary(), "+1 ~1 -0, 2 total");
    }

    fn tracked(names: &[(&str, &str)]) -> SyncManifest {
        let mut m = SyncManifest::new(ProjectId::from("p"));
        let now = Utc::now();
        for (name, content) in names {
            m.files.insert(
                name.to_string(),
                FileSyncEntry {
                    content_hash: ContentHash::of(content),
                    last_modified: now,
                    synced_at: now,
                },
            );
        }
        m
    }

    #[rstest]
    #[case(SyncDirection::Pull, false, true)]
    #[case(SyncDirection::Push, false, true)]
    #[case(SyncDirection::PullOnly, false, false)]
    #[case(SyncDirection::PushOnly, false, false)]
    #[case(SyncDirection::PullOnly, true, true)]
    #[case(SyncDirection::PushOnly, true, true)]
    fn deletes_follow_direction_and_reconcile(
        #[case] direction: SyncDirection,
        #[case] reconcile: bool,
        #[case] deletes: bool,
    ) {
        let m = tracked(&[("gone", "x")]);
        // The destination side holds the tracked file, the source does not.
        let (local, remote) = match direction {
            SyncDirection::Pull | SyncDirection::PullOnly => (vec![snap("gone", "x")], vec![]),
            _ => (vec![], vec![snap("gone", "x")]),
        };
        let plan = plan_round(direction, &local, &remote, Some(&m), false, reconcile);
        let leg = match direction {
            SyncDirection::Pull | SyncDirection::PullOnly => &plan.pull,
            _ => &plan.push,
        };
        assert_eq!(leg.has_destructive_changes, deletes);
        assert_eq!(leg.total_operations, usize::from(deletes));
    }

    #[test]
    fn push_plan_only_touches_remote() {
        let local = [snap("new", "n")];
        let plan = plan_round(SyncDirection::PushOnly, &local, &[], None, true, false);
        assert!(plan.pull.is_empty());
        assert_eq!(plan.push.add.len(), 1);
        assert_eq!(plan.total_operations(), 1);
    }

    #[test]
    fn bidirectional_summary_names_both_legs() {
        let plan = plan_round(
            SyncDirection::Bidirectional,
            &[snap("mine", "m")],
            &[snap("theirs", "t")],
            None,
            true,
            false,
        );
        assert_eq!(plan.summary(), "pull +1 ~0 -0, 1 total; push +1 ~0 -0, 1 total");

        let idle = plan_round(SyncDirection::Bidirectional, &[], &[], None, true, false);
        assert_eq!(idle.summary(), "No changes detected");
    }
}
