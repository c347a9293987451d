//! Directory-backed remote store.
//!
//! Each project is one JSON document, `<root>/<project_id>.json`, in the
//! same shape a hosted project's content listing uses. Useful as an offline
//! stand-in for the hosted service and as a fixture for end-to-end tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use gasket_core::{FileRecord, FileType, ProjectId};

use super::{parse_file_records, validate_records, ProjectContent, RemoteConnector, RemoteError, RemoteFileStore};

/// Remote store persisted as one JSON document per project.
#[derive(Debug)]
pub struct DirectoryRemoteStore {
    root: PathBuf,
    // Serialises read-modify-write cycles on project documents.
    lock: Mutex<()>,
}

impl DirectoryRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn project_path(&self, project: &ProjectId) -> PathBuf {
        self.root.join(format!("{}.json", project.0))
    }

    /// Create or replace a whole project document.
    pub async fn put_project(
        &self,
        project: &ProjectId,
        records: Vec<FileRecord>,
    ) -> Result<(), RemoteError> {
        validate_records(&records)?;
        let _guard = self.lock.lock().await;
        self.save(project, records).await
    }

    async fn load(&self, project: &ProjectId) -> Result<Vec<FileRecord>, RemoteError> {
        let path = self.project_path(project);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RemoteError::ProjectNotFound(project.clone()));
            }
            Err(err) => return Err(transport(&path, err)),
        };
        parse_file_records(&json)
    }

    async fn save(&self, project: &ProjectId, mut records: Vec<FileRecord>) -> Result<(), RemoteError> {
        records.sort_by(|a, b| a.name.cmp(&b.name));
        let content = ProjectContent {
            script_id: Some(project.0.clone()),
            files: records,
        };
        let json = serde_json::to_string_pretty(&content)
            .map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;

        let path = self.project_path(project);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| transport(&self.root, e))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| transport(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(transport(&path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFileStore for DirectoryRemoteStore {
    async fn list(&self, project: &ProjectId) -> Result<Vec<FileRecord>, RemoteError> {
        let _guard = self.lock.lock().await;
        self.load(project).await
    }

    async fn write(
        &self,
        project: &ProjectId,
        filename: &str,
        content: &str,
        file_type: FileType,
    ) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load(project).await?;
        let record = FileRecord {
            name: filename.to_string(),
            file_type,
            source: content.to_string(),
            update_time: Utc::now(),
        };
        match records.iter_mut().find(|r| r.name == filename) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save(project, records).await
    }

    async fn delete(&self, project: &ProjectId, filename: &str) -> Result<(), RemoteError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load(project).await?;
        let before = records.len();
        records.retain(|r| r.name != filename);
        if records.len() == before {
            tracing::debug!("remote delete of absent file '{filename}'");
            return Ok(());
        }
        self.save(project, records).await
    }
}

/// Connector for [`DirectoryRemoteStore`]; any non-empty token is accepted.
#[derive(Debug, Clone)]
pub struct DirectoryConnector {
    root: PathBuf,
}

impl DirectoryConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RemoteConnector for DirectoryConnector {
    async fn connect(&self, access_token: &str) -> Result<Arc<dyn RemoteFileStore>, RemoteError> {
        if access_token.trim().is_empty() {
            return Err(RemoteError::Unauthorized("empty access token".to_string()));
        }
        Ok(Arc::new(DirectoryRemoteStore::new(self.root.clone())))
    }
}

fn transport(path: &Path, err: std::io::Error) -> RemoteError {
    RemoteError::Transport(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> ProjectId {
        ProjectId::from("proj")
    }

    #[tokio::test]
    async fn missing_document_is_project_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryRemoteStore::new(tmp.path());
        assert_eq!(
            store.list(&project()).await.unwrap_err(),
            RemoteError::ProjectNotFound(project())
        );
    }

    #[tokio::test]
    async fn write_upserts_and_delete_removes() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryRemoteStore::new(tmp.path());
        store.put_project(&project(), vec![]).await.unwrap();

        store.write(&project(), "Code", "v1", FileType::ServerJs).await.unwrap();
        store.write(&project(), "Code", "v2", FileType::ServerJs).await.unwrap();
        store.write(&project(), "page", "<p/>", FileType::Html).await.unwrap();
        let files = store.list(&project()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "Code");
        assert_eq!(files[0].source, "v2");

        store.delete(&project(), "page").await.unwrap();
        store.delete(&project(), "page").await.unwrap();
        assert_eq!(store.list(&project()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_document_is_invalid_payload() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("proj.json"), r#"{"files": [{"name": 1}]}"#).unwrap();
        let store = DirectoryRemoteStore::new(tmp.path());
        assert!(matches!(
            store.list(&project()).await,
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn connector_requires_a_token() {
        let tmp = TempDir::new().unwrap();
        let connector = DirectoryConnector::new(tmp.path());
        assert!(matches!(
            connector.connect("  ").await,
            Err(RemoteError::Unauthorized(_))
        ));
        assert!(connector.connect("local").await.is_ok());
    }
}
