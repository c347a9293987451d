//! Round pipeline: the entry point used by the CLI.
//!
//! [`SyncEngine::sync`] runs one round for one project:
//!
//! 1. Take the project's round lock. A second round for the same project
//!    waits; other projects proceed. The working copy's `.gasket/round.lock`
//!    is then locked too, which serialises rounds across processes.
//! 2. Load the manifest.
//! 3. Connect the remote (through the client cache) and list its files.
//! 4. Snapshot the working copy.
//! 5. Plan the round and hand it to the executor.
//!
//! [`SyncEngine::preview`] stops after step 5's planning and is what
//! `gasket diff` prints.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use gasket_core::{FileSnapshot, ProjectConfig, ProjectId, SyncDirection};

use crate::analyzer::{ContentAnalyzer, FileAnalysis};
use crate::cache::{credential_fingerprint, ClientCache, DEFAULT_CLIENT_TTL};
use crate::checkpoint::Checkpoint;
use crate::diff::{self, Conflict, FileDiff};
use crate::error::SyncError;
use crate::executor::{self, ApplyRequest, Collaborators, ExecutionResult, FailedFile};
use crate::lock::RoundLock;
use crate::manifest::{LoadedManifest, ManifestStore};
use crate::naming::{ExtensionMapper, FilenameMapper};
use crate::plan::{plan_round, RoundPlan};
use crate::remote::{validate_records, RemoteConnector, RemoteError, RemoteFileStore};
use crate::working_copy::WorkingCopy;

/// Parameters of one round.
#[derive(Clone)]
pub struct SyncRequest {
    pub project_id: ProjectId,
    /// Working copy root; the manifest lives in its `.gasket/` directory.
    pub local_path: PathBuf,
    /// Directory holding the script files; defaults to `local_path`.
    pub source_root: Option<PathBuf>,
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub reconcile: bool,
    pub access_token: String,
    pub mapper: Arc<dyn FilenameMapper>,
}

impl SyncRequest {
    pub fn new(project_id: ProjectId, local_path: impl Into<PathBuf>, direction: SyncDirection) -> Self {
        Self {
            project_id,
            local_path: local_path.into(),
            source_root: None,
            direction,
            dry_run: false,
            reconcile: false,
            access_token: String::new(),
            mapper: Arc::new(ExtensionMapper::default()),
        }
    }

    /// Request for the working copy at `local_path` described by `config`.
    pub fn from_config(
        local_path: impl Into<PathBuf>,
        config: &ProjectConfig,
        direction: SyncDirection,
    ) -> Self {
        let local_path = local_path.into();
        let source_root = config.root_dir.as_ref().map(|_| config.source_root(&local_path));
        Self {
            source_root,
            mapper: Arc::new(ExtensionMapper::new(config.script_extension)),
            ..Self::new(config.project_id.clone(), local_path, direction)
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn reconcile(mut self, reconcile: bool) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn FilenameMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    fn working_copy(&self) -> WorkingCopy {
        WorkingCopy::new(self.source_root.clone().unwrap_or_else(|| self.local_path.clone()))
    }
}

/// Outcome of [`SyncEngine::sync`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub project_id: ProjectId,
    pub direction: SyncDirection,
    pub success: bool,
    pub dry_run: bool,
    pub pulled: Vec<String>,
    pub pushed: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_analysis: Option<Vec<FileAnalysis>>,
    pub manifest_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_error: Option<String>,
    pub summary: String,
}

impl SyncReport {
    fn new(project_id: ProjectId, result: ExecutionResult) -> Self {
        Self {
            project_id,
            direction: result.direction,
            success: result.success(),
            dry_run: result.dry_run,
            pulled: result.pulled,
            pushed: result.pushed,
            failed: result.failed,
            conflicts: result.conflicts,
            content_analysis: result.content_analysis,
            manifest_saved: result.manifest_saved,
            checkpoint_error: result.checkpoint_error,
            summary: result.summary,
        }
    }
}

/// A planned round together with the snapshots it was planned from.
#[derive(Debug, Clone)]
pub struct RoundPreview {
    pub plan: RoundPlan,
    pub local: Vec<FileSnapshot>,
    pub remote: Vec<FileSnapshot>,
}

impl RoundPreview {
    /// Unified diffs for every planned operation, pull leg first.
    ///
    /// Each diff goes from the destination's current content to the
    /// content the round would leave there.
    pub fn unified_diffs(&self) -> Vec<FileDiff> {
        let legs = [
            (&self.plan.pull, self.local.as_slice()),
            (&self.plan.push, self.remote.as_slice()),
        ];
        let mut diffs = Vec::new();
        for (ops, dest) in legs {
            for op in ops.operations() {
                let old = dest
                    .iter()
                    .find(|s| s.filename == op.filename)
                    .map(|s| s.content.as_str())
                    .unwrap_or_default();
                let new = op.content.as_deref().unwrap_or_default();
                diffs.push(diff::unified_diff(&op.filename, old, new));
            }
        }
        diffs
    }
}

/// Runs sync rounds against one remote service.
pub struct SyncEngine {
    connector: Arc<dyn RemoteConnector>,
    clients: ClientCache<Arc<dyn RemoteFileStore>>,
    analyzer: Option<Arc<dyn ContentAnalyzer>>,
    checkpoint: Option<Arc<dyn Checkpoint>>,
    rounds: Mutex<HashMap<ProjectId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            clients: ClientCache::new(DEFAULT_CLIENT_TTL),
            analyzer: None,
            checkpoint: None,
            rounds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_client_cache(mut self, clients: ClientCache<Arc<dyn RemoteFileStore>>) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn Checkpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Run one round.
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncReport, SyncError> {
        let project_id = request.project_id.clone();
        let guard = self.round_lock(&project_id).lock_owned().await;
        let report = self.locked_round(request).await;
        drop(guard);
        self.release_round_lock(&project_id);
        report
    }

    async fn locked_round(&self, request: SyncRequest) -> Result<SyncReport, SyncError> {
        let _held = RoundLock::acquire(&request.local_path).await?;

        let prepared = self.prepare(&request).await?;
        tracing::info!(
            "{} round for {}: {}",
            request.direction,
            request.project_id,
            prepared.preview.plan.summary()
        );

        let collab = Collaborators {
            remote: prepared.remote,
            working_copy: request.working_copy(),
            mapper: request.mapper.clone(),
            analyzer: self.analyzer.clone(),
            checkpoint: self.checkpoint.clone(),
        };
        let result = executor::apply(
            &collab,
            ApplyRequest {
                project_id: &request.project_id,
                plan: &prepared.preview.plan,
                previous: prepared.loaded.manifest.as_ref(),
                manifest_store: &prepared.store,
                dry_run: request.dry_run,
            },
        )
        .await;

        match result {
            Ok(result) => Ok(SyncReport::new(request.project_id, result)),
            Err(err) => {
                self.forget_rejected_client(&request.access_token, &err);
                Err(err)
            }
        }
    }

    /// Plan a round without applying it.
    pub async fn preview(&self, request: &SyncRequest) -> Result<RoundPreview, SyncError> {
        Ok(self.prepare(request).await?.preview)
    }

    async fn prepare(&self, request: &SyncRequest) -> Result<Prepared, SyncError> {
        let store = ManifestStore::at(&request.local_path, request.project_id.clone());
        let loaded = store.load().await?;

        let remote_store = self.client(&request.access_token).await?;
        let records = match remote_store.list(&request.project_id).await {
            Ok(records) => records,
            Err(err) => {
                let err = SyncError::Remote(err);
                self.forget_rejected_client(&request.access_token, &err);
                return Err(err);
            }
        };
        validate_records(&records)?;
        let remote = diff::from_remote_files(&records);

        let local = request.working_copy().snapshot(request.mapper.as_ref()).await?;

        let plan = plan_round(
            request.direction,
            &local,
            &remote,
            loaded.manifest.as_ref(),
            loaded.is_bootstrap,
            request.reconcile,
        );
        Ok(Prepared {
            store,
            loaded,
            remote: remote_store,
            preview: RoundPreview { plan, local, remote },
        })
    }

    async fn client(&self, access_token: &str) -> Result<Arc<dyn RemoteFileStore>, SyncError> {
        let key = credential_fingerprint(access_token);
        if let Some(client) = self.clients.get(&key) {
            return Ok(client);
        }
        let client = self.connector.connect(access_token).await?;
        tracing::debug!("connected new remote client");
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    fn forget_rejected_client(&self, access_token: &str, err: &SyncError) {
        if matches!(err, SyncError::Remote(RemoteError::Unauthorized(_))) {
            self.clients.invalidate(&credential_fingerprint(access_token));
        }
    }

    fn round_lock(&self, project: &ProjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut rounds = self.rounds.lock().unwrap_or_else(|e| e.into_inner());
        rounds.entry(project.clone()).or_default().clone()
    }

    /// Forget the project's round lock once no round holds or awaits it.
    fn release_round_lock(&self, project: &ProjectId) {
        let mut rounds = self.rounds.lock().unwrap_or_else(|e| e.into_inner());
        if rounds.get(project).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            rounds.remove(project);
        }
    }
}

struct Prepared {
    store: ManifestStore,
    loaded: LoadedManifest,
    remote: Arc<dyn RemoteFileStore>,
    preview: RoundPreview,
}
