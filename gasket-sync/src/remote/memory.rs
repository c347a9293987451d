//! In-memory remote store for tests and previews.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use gasket_core::{FileRecord, FileType, ProjectId};

use super::{RemoteConnector, RemoteError, RemoteFileStore};

/// In-memory [`RemoteFileStore`] with failure injection.
///
/// Files live in a map behind a [`RwLock`], so every trait method works on
/// `&self`. Writes and deletes for selected filenames can be made to fail
/// with a chosen [`RemoteError`].
#[derive(Default)]
pub struct MemoryRemoteStore {
    projects: RwLock<HashMap<ProjectId, BTreeMap<String, FileRecord>>>,
    failing: RwLock<HashMap<String, RemoteError>>,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryRemoteStore {
    /// A store holding one project with the given `(name, type, source)` files.
    pub fn with_files<'a>(
        project: &ProjectId,
        files: impl IntoIterator<Item = (&'a str, FileType, &'a str)>,
    ) -> Self {
        let now = Utc::now();
        let records = files
            .into_iter()
            .map(|(name, file_type, source)| {
                (
                    name.to_string(),
                    FileRecord {
                        name: name.to_string(),
                        file_type,
                        source: source.to_string(),
                        update_time: now,
                    },
                )
            })
            .collect();
        let mut projects = HashMap::new();
        projects.insert(project.clone(), records);
        Self {
            projects: RwLock::new(projects),
            ..Self::default()
        }
    }

    /// A store holding one empty project.
    pub fn empty(project: &ProjectId) -> Self {
        let mut projects = HashMap::new();
        projects.insert(project.clone(), BTreeMap::new());
        Self {
            projects: RwLock::new(projects),
            ..Self::default()
        }
    }

    /// Make every write or delete of `filename` fail with `error`.
    pub async fn fail_on(&self, filename: &str, error: RemoteError) {
        self.failing
            .write()
            .await
            .insert(filename.to_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    /// Current source of `filename`, if present.
    pub async fn source(&self, project: &ProjectId, filename: &str) -> Option<String> {
        self.projects
            .read()
            .await
            .get(project)
            .and_then(|files| files.get(filename))
            .map(|r| r.source.clone())
    }

    pub async fn filenames(&self, project: &ProjectId) -> Vec<String> {
        self.projects
            .read()
            .await
            .get(project)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Successful deletes so far.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    async fn injected(&self, filename: &str) -> Result<(), RemoteError> {
        match self.failing.read().await.get(filename) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteFileStore for MemoryRemoteStore {
    async fn list(&self, project: &ProjectId) -> Result<Vec<FileRecord>, RemoteError> {
        self.projects
            .read()
            .await
            .get(project)
            .map(|files| files.values().cloned().collect())
            .ok_or_else(|| RemoteError::ProjectNotFound(project.clone()))
    }

    async fn write(
        &self,
        project: &ProjectId,
        filename: &str,
        content: &str,
        file_type: FileType,
    ) -> Result<(), RemoteError> {
        self.injected(filename).await?;
        let mut guard = self.projects.write().await;
        let files = guard
            .get_mut(project)
            .ok_or_else(|| RemoteError::ProjectNotFound(project.clone()))?;
        files.insert(
            filename.to_string(),
            FileRecord {
                name: filename.to_string(),
                file_type,
                source: content.to_string(),
                update_time: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, project: &ProjectId, filename: &str) -> Result<(), RemoteError> {
        self.injected(filename).await?;
        let mut guard = self.projects.write().await;
        let files = guard
            .get_mut(project)
            .ok_or_else(|| RemoteError::ProjectNotFound(project.clone()))?;
        files.remove(filename);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that hands out one shared [`MemoryRemoteStore`].
///
/// Tokens listed in `rejected` fail with [`RemoteError::Unauthorized`].
pub struct MemoryConnector {
    store: Arc<MemoryRemoteStore>,
    rejected: HashSet<String>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryRemoteStore>) -> Self {
        Self {
            store,
            rejected: HashSet::new(),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self, token: &str) -> Self {
        self.rejected.insert(token.to_string());
        self
    }

    /// Successful `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, access_token: &str) -> Result<Arc<dyn RemoteFileStore>, RemoteError> {
        if self.rejected.contains(access_token) {
            return Err(RemoteError::Unauthorized("token rejected".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> ProjectId {
        ProjectId::from("p")
    }

    #[tokio::test]
    async fn write_then_list() {
        let store = MemoryRemoteStore::empty(&project());
        store
            .write(&project(), "Code", "function a() {}", FileType::ServerJs)
            .await
            .unwrap();
        let files = store.list(&project()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source, "function a() {}");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let store = MemoryRemoteStore::default();
        let err = store.list(&project()).await.unwrap_err();
        assert_eq!(err, RemoteError::ProjectNotFound(project()));
    }

    #[tokio::test]
    async fn injected_failures_apply_to_one_file() {
        let store = MemoryRemoteStore::with_files(&project(), [("a", FileType::Html, "x")]);
        store
            .fail_on(
                "a",
                RemoteError::Rejected {
                    filename: "a".into(),
                    reason: "locked".into(),
                },
            )
            .await;
        assert!(store.delete(&project(), "a").await.is_err());
        assert!(store.write(&project(), "b", "y", FileType::Html).await.is_ok());
        assert_eq!(store.filenames(&project()).await, vec!["a", "b"]);

        store.clear_failures().await;
        store.delete(&project(), "a").await.unwrap();
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn connector_rejects_listed_tokens() {
        let connector =
            MemoryConnector::new(Arc::new(MemoryRemoteStore::default())).rejecting("bad");
        assert!(matches!(
            connector.connect("bad").await,
            Err(RemoteError::Unauthorized(_))
        ));
        assert!(connector.connect("good").await.is_ok());
        assert_eq!(connector.connect_count(), 1);
    }
}
