//! Sync executor: applies a [`RoundPlan`] and advances the manifest.
//!
//! ## Apply protocol
//!
//! 1. Pull leg: write or remove local files through the [`WorkingCopy`].
//! 2. Push leg: write or delete remote files through the [`RemoteFileStore`].
//! 3. Analyze every applied script file.
//! 4. Record a checkpoint if anything changed.
//! 5. Save the advanced manifest. This is always the last write.
//!
//! A pulled write also removes any local copy of the same file mapped under
//! another file type, so a file retyped upstream does not leave a duplicate.
//!
//! Within a leg, operations run adds, then updates, then deletes. A local
//! I/O failure or a remote rejection is recorded against the filename and
//! the round continues; a fatal remote error aborts it before the manifest
//! is touched. A dry run reports what would happen and writes nothing.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use gasket_core::{DiffAction, DiffOperation, FileType, ProjectId, SyncDirection, SyncManifest};

use crate::analyzer::{AnalyzeOptions, ContentAnalyzer, FileAnalysis};
use crate::checkpoint::{Checkpoint, CheckpointSummary};
use crate::diff::Conflict;
use crate::error::SyncError;
use crate::manifest::{self, BaselineUpdate, ManifestStore};
use crate::naming::FilenameMapper;
use crate::plan::RoundPlan;
use crate::remote::RemoteFileStore;
use crate::working_copy::WorkingCopy;

/// External parties the executor talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub remote: Arc<dyn RemoteFileStore>,
    pub working_copy: WorkingCopy,
    pub mapper: Arc<dyn FilenameMapper>,
    pub analyzer: Option<Arc<dyn ContentAnalyzer>>,
    pub checkpoint: Option<Arc<dyn Checkpoint>>,
}

/// One round's worth of work.
#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    pub project_id: &'a ProjectId,
    pub plan: &'a RoundPlan,
    /// Manifest loaded at the start of the round.
    pub previous: Option<&'a SyncManifest>,
    pub manifest_store: &'a ManifestStore,
    pub dry_run: bool,
}

/// Which side an operation was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Applied,
    /// Dry run: the operation was planned but not performed.
    WouldApply,
    Failed { reason: String },
}

/// Outcome of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub filename: String,
    pub action: DiffAction,
    pub side: Side,
    pub status: OutcomeStatus,
}

/// A file the round could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub filename: String,
    pub action: DiffAction,
    pub side: Side,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub outcomes: Vec<FileOutcome>,
    /// Filenames changed locally (or that would be, on a dry run).
    pub pulled: Vec<String>,
    /// Filenames changed remotely (or that would be, on a dry run).
    pub pushed: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub conflicts: Vec<Conflict>,
    /// `None` when no file produced findings.
    pub content_analysis: Option<Vec<FileAnalysis>>,
    pub manifest_saved: bool,
    /// Set when the checkpoint collaborator failed; the round still succeeds.
    pub checkpoint_error: Option<String>,
    pub summary: String,
}

impl ExecutionResult {
    /// `true` if nothing failed and nothing was left in conflict.
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.conflicts.is_empty()
    }
}

/// Apply `request.plan` through `collab`.
pub async fn apply(
    collab: &Collaborators,
    request: ApplyRequest<'_>,
) -> Result<ExecutionResult, SyncError> {
    let plan = request.plan;
    let mut outcomes = Vec::with_capacity(plan.total_operations());
    let mut applied: Vec<&DiffOperation> = Vec::new();

    for op in plan.pull.operations() {
        let status = if request.dry_run {
            tracing::info!("[dry-run] would {} local '{}'", op.action, op.filename);
            OutcomeStatus::WouldApply
        } else {
            apply_local(collab, op).await
        };
        if status == OutcomeStatus::Applied {
            applied.push(op);
        }
        outcomes.push(outcome(op, Side::Local, status));
    }

    for op in plan.push.operations() {
        let status = if request.dry_run {
            tracing::info!("[dry-run] would {} remote '{}'", op.action, op.filename);
            OutcomeStatus::WouldApply
        } else {
            apply_remote(collab, request.project_id, op).await?
        };
        if status == OutcomeStatus::Applied {
            applied.push(op);
        }
        outcomes.push(outcome(op, Side::Remote, status));
    }

    let content_analysis = analyze(collab.analyzer.as_deref(), plan, &outcomes);

    let failed: Vec<FailedFile> = outcomes
        .iter()
        .filter_map(|o| match &o.status {
            OutcomeStatus::Failed { reason } => Some(FailedFile {
                filename: o.filename.clone(),
                action: o.action,
                side: o.side,
                reason: reason.clone(),
            }),
            _ => None,
        })
        .collect();
    let changed = |side: Side| -> Vec<String> {
        outcomes
            .iter()
            .filter(|o| o.side == side && !matches!(o.status, OutcomeStatus::Failed { .. }))
            .map(|o| o.filename.clone())
            .collect()
    };
    let pulled = changed(Side::Local);
    let pushed = changed(Side::Remote);

    let mut result = ExecutionResult {
        direction: plan.direction,
        dry_run: request.dry_run,
        summary: summarize(plan, request.dry_run, applied.len(), failed.len()),
        outcomes,
        pulled,
        pushed,
        failed,
        conflicts: plan.conflicts.clone(),
        content_analysis,
        manifest_saved: false,
        checkpoint_error: None,
    };

    if request.dry_run {
        return Ok(result);
    }

    if !applied.is_empty() {
        if let Some(checkpoint) = &collab.checkpoint {
            let summary = CheckpointSummary {
                project_id: request.project_id.clone(),
                direction: plan.direction,
                pulled: result.pulled.clone(),
                pushed: result.pushed.clone(),
            };
            if let Err(err) = checkpoint.record(&summary).await {
                tracing::warn!("checkpoint failed for {}: {err}", request.project_id);
                result.checkpoint_error = Some(err.to_string());
            }
        }
    }

    let clean = result.success();
    if !applied.is_empty() || clean {
        let next = manifest::advance(
            request.previous,
            request.project_id,
            BaselineUpdate {
                direction: plan.direction,
                present: &plan.present,
                in_sync: &plan.in_sync,
                applied,
                clean,
                now: Utc::now(),
            },
        );
        request.manifest_store.save(&next).await?;
        result.manifest_saved = true;
    } else {
        tracing::warn!(
            "round for {} applied nothing and had failures; manifest left unchanged",
            request.project_id
        );
    }

    Ok(result)
}

async fn apply_local(collab: &Collaborators, op: &DiffOperation) -> OutcomeStatus {
    let path = match collab.mapper.local_path(&op.filename, op.file_type) {
        Ok(path) => path,
        Err(err) => return failed(err.to_string()),
    };
    let result = match (op.action, op.content.as_deref()) {
        (DiffAction::Delete, _) => collab.working_copy.remove(&path).await,
        (_, Some(content)) => match collab.working_copy.write(&path, content).await {
            Ok(()) => remove_retyped(collab, op, &path).await,
            Err(err) => Err(err),
        },
        (_, None) => return failed("operation carries no content".to_string()),
    };
    match result {
        Ok(()) => {
            tracing::info!("pulled {} '{}' -> {}", op.action, op.filename, path.display());
            OutcomeStatus::Applied
        }
        Err(err) => {
            tracing::warn!("local {} of '{}' failed: {err}", op.action, op.filename);
            failed(err.to_string())
        }
    }
}

/// Remove local copies of `op.filename` mapped under another file type.
async fn remove_retyped(
    collab: &Collaborators,
    op: &DiffOperation,
    written: &Path,
) -> Result<(), SyncError> {
    for &file_type in FileType::all() {
        if file_type == op.file_type {
            continue;
        }
        let Ok(stale) = collab.mapper.local_path(&op.filename, file_type) else {
            continue;
        };
        if stale == written || !collab.working_copy.contains(&stale).await {
            continue;
        }
        collab.working_copy.remove(&stale).await?;
        tracing::info!(
            "removed {} now that '{}' is {}",
            stale.display(),
            op.filename,
            op.file_type
        );
    }
    Ok(())
}

async fn apply_remote(
    collab: &Collaborators,
    project: &ProjectId,
    op: &DiffOperation,
) -> Result<OutcomeStatus, SyncError> {
    let name = collab.mapper.remote_name(&op.filename, op.file_type);
    let result = match (op.action, op.content.as_deref()) {
        (DiffAction::Delete, _) => collab.remote.delete(project, &name).await,
        (_, Some(content)) => {
            collab
                .remote
                .write(project, &name, content, op.file_type)
                .await
        }
        (_, None) => return Ok(failed("operation carries no content".to_string())),
    };
    match result {
        Ok(()) => {
            tracing::info!("pushed {} '{}'", op.action, name);
            Ok(OutcomeStatus::Applied)
        }
        Err(err) if err.is_fatal() => Err(SyncError::Remote(err)),
        Err(err) => {
            tracing::warn!("remote {} of '{}' rejected: {err}", op.action, name);
            Ok(failed(err.to_string()))
        }
    }
}

fn analyze(
    analyzer: Option<&dyn ContentAnalyzer>,
    plan: &RoundPlan,
    outcomes: &[FileOutcome],
) -> Option<Vec<FileAnalysis>> {
    let analyzer = analyzer?;
    let options = AnalyzeOptions::default();
    let findings: Vec<FileAnalysis> = plan
        .pull
        .operations()
        .chain(plan.push.operations())
        .zip(outcomes)
        .filter(|(op, outcome)| {
            op.file_type.is_script()
                && op.action != DiffAction::Delete
                && !matches!(outcome.status, OutcomeStatus::Failed { .. })
        })
        .filter_map(|(op, _)| {
            let content = op.content.as_deref()?;
            let report = analyzer.analyze(content, &options, Some(&op.filename));
            (!report.is_empty()).then(|| FileAnalysis {
                filename: op.filename.clone(),
                warnings: report.warnings,
                hints: report.hints,
            })
        })
        .collect();
    (!findings.is_empty()).then_some(findings)
}

fn summarize(plan: &RoundPlan, dry_run: bool, applied: usize, failed: usize) -> String {
    let mut summary = plan.summary();
    if dry_run {
        summary = format!("[dry-run] {summary}");
    } else if failed > 0 {
        summary.push_str(&format!(" ({applied} applied, {failed} failed)"));
    }
    if !plan.conflicts.is_empty() {
        summary.push_str(&format!(", {} conflicts", plan.conflicts.len()));
    }
    summary
}

fn outcome(op: &DiffOperation, side: Side, status: OutcomeStatus) -> FileOutcome {
    FileOutcome {
        filename: op.filename.clone(),
        action: op.action,
        side,
        status,
    }
}

fn failed(reason: String) -> OutcomeStatus {
    OutcomeStatus::Failed { reason }
}
