//! Session: unit of work over a [`RepositoryBackend`]
//!
//! A session stages every mutation locally (read-your-writes through an
//! overlay) and hands the whole change log to the backend on [`Session::save`].
//! Unsaved changes are discarded when the session is dropped, so an operation
//! that fails before saving leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    path_from_subject, Binary, Change, GraphUpdate, Node, NodeKind, NodeType, PropertyGraph,
    RepoPath, RepositoryBackend,
};
use crate::error::{Result, StorageError};

pub struct Session {
    id: Uuid,
    backend: Arc<dyn RepositoryBackend>,
    overlay: HashMap<RepoPath, Option<Node>>,
    changes: Vec<Change>,
}

impl Session {
    pub fn new(backend: Arc<dyn RepositoryBackend>) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            overlay: HashMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Node as seen by this session (staged state first)
    pub async fn node(&self, path: &RepoPath) -> Result<Option<Node>> {
        match self.overlay.get(path) {
            Some(staged) => Ok(staged.clone()),
            None => self.backend.get_node(path).await,
        }
    }

    pub async fn exists(&self, path: &RepoPath) -> Result<bool> {
        match self.overlay.get(path) {
            Some(staged) => Ok(staged.is_some()),
            None => self.backend.exists(path).await,
        }
    }

    /// Existing object, else `NotFound`
    pub async fn require_object(&self, path: &RepoPath) -> Result<Node> {
        match self.node(path).await? {
            Some(node) if node.kind == NodeKind::Object => Ok(node),
            _ => Err(StorageError::not_found(path)),
        }
    }

    /// Return the existing object or stage a bare one
    pub async fn find_or_create_object(
        &mut self,
        path: &RepoPath,
        node_type: NodeType,
    ) -> Result<()> {
        match self.node(path).await? {
            Some(node) if node.kind == NodeKind::Object => Ok(()),
            Some(_) => Err(StorageError::conflict(format!(
                "Path is occupied by a datastream: {}",
                path
            ))),
            None => self.create_object(path, node_type).await,
        }
    }

    /// Stage a new object; `Conflict` if the path is taken now or at commit
    pub async fn create_object(&mut self, path: &RepoPath, node_type: NodeType) -> Result<()> {
        self.stage(Change::CreateObject {
            path: path.clone(),
            node_types: vec![node_type],
        })
        .await
    }

    pub async fn read_graph(&self, path: &RepoPath) -> Result<PropertyGraph> {
        self.node(path)
            .await?
            .map(|node| node.properties)
            .ok_or_else(|| StorageError::not_found(path))
    }

    /// Stage an insert/delete script, routed by its subject
    pub async fn update_graph(&mut self, update: GraphUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let path = path_from_subject(&update.subject)?;
        self.stage(Change::UpdateGraph { path, update }).await
    }

    /// Stage a new datastream; `Conflict` if the path is taken now or at commit
    pub async fn create_datastream(
        &mut self,
        path: &RepoPath,
        node_type: NodeType,
        content: Binary,
    ) -> Result<()> {
        self.stage(Change::CreateDatastream {
            path: path.clone(),
            node_types: vec![node_type],
            content,
        })
        .await
    }

    /// Create or open the datastream at `path` and replace its content
    pub async fn write_datastream(
        &mut self,
        path: &RepoPath,
        node_type: NodeType,
        content: Binary,
    ) -> Result<()> {
        self.stage(Change::WriteContent {
            path: path.clone(),
            node_types: vec![node_type],
            content,
        })
        .await
    }

    /// Content of the datastream at `path`; `None` when absent
    pub async fn read_datastream(&self, path: &RepoPath) -> Result<Option<Binary>> {
        match self.node(path).await? {
            Some(node) if node.kind == NodeKind::Datastream => Ok(node.content),
            Some(_) => Err(StorageError::corrupt_state(format!(
                "Expected a datastream at {}",
                path
            ))),
            None => Ok(None),
        }
    }

    pub async fn delete(&mut self, path: &RepoPath) -> Result<()> {
        self.stage(Change::Delete { path: path.clone() }).await
    }

    /// Committed full-text query; staged changes are not visible to it
    pub async fn full_text_search(
        &self,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        self.backend
            .full_text_search(node_type, terms, offset, limit)
            .await
    }

    /// Commit all staged changes in one backend transaction
    pub async fn save(&mut self) -> Result<()> {
        if self.changes.is_empty() {
            return Ok(());
        }
        let changes = std::mem::take(&mut self.changes);
        self.overlay.clear();
        debug!(session = %self.id, changes = changes.len(), "Committing session");
        self.backend.commit(&changes).await
    }

    /// Drop all staged changes
    pub fn discard(&mut self) {
        if !self.changes.is_empty() {
            debug!(session = %self.id, changes = self.changes.len(), "Discarding staged changes");
        }
        self.changes.clear();
        self.overlay.clear();
    }

    /// Save on success, discard on failure
    pub async fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.save().await?;
                Ok(value)
            }
            Err(err) => {
                self.discard();
                Err(err)
            }
        }
    }

    async fn stage(&mut self, change: Change) -> Result<()> {
        let current = self.node(change.path()).await?;
        let next = change.apply(current)?;
        self.overlay.insert(change.path().clone(), next);
        self.changes.push(change);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.changes.is_empty() {
            warn!(
                session = %self.id,
                changes = self.changes.len(),
                "Session dropped with unsaved changes; discarding"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::PROP_HAS_TITLE;
    use crate::error::ErrorKind;
    use crate::infrastructure::InMemoryBackend;

    fn path(s: &str) -> RepoPath {
        RepoPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_staged_writes_are_visible_only_to_the_session() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut session = Session::new(backend.clone());
        let p = path("entities/e1");

        session
            .create_object(&p, NodeType::IntellectualEntity)
            .await
            .unwrap();
        assert!(session.exists(&p).await.unwrap());
        assert!(!backend.exists(&p).await.unwrap());

        session.save().await.unwrap();
        assert!(backend.exists(&p).await.unwrap());
        assert!(!session.has_pending_changes());
    }

    #[tokio::test]
    async fn test_drop_discards_unsaved_changes() {
        let backend = Arc::new(InMemoryBackend::new());
        {
            let mut session = Session::new(backend.clone());
            session
                .create_object(&path("entities/e1"), NodeType::IntellectualEntity)
                .await
                .unwrap();
        }
        assert!(!backend.exists(&path("entities/e1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_finish_discards_on_error() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut session = Session::new(backend.clone());
        session
            .create_object(&path("entities/e1"), NodeType::IntellectualEntity)
            .await
            .unwrap();

        let result: Result<()> = Err(StorageError::backend("boom"));
        assert!(session.finish(result).await.is_err());
        assert!(!session.has_pending_changes());
        assert!(!backend.exists(&path("entities/e1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_graph_update_is_routed_by_subject() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut session = Session::new(backend.clone());
        let p = path("entities/e1");
        session
            .create_object(&p, NodeType::IntellectualEntity)
            .await
            .unwrap();
        session
            .update_graph(GraphUpdate::for_path(&p).insert_literal(PROP_HAS_TITLE, "t"))
            .await
            .unwrap();
        session.save().await.unwrap();

        let mut reader = Session::new(backend);
        let graph = reader.read_graph(&p).await.unwrap();
        assert_eq!(graph.first_literal(PROP_HAS_TITLE), Some("t"));

        let err = reader
            .update_graph(GraphUpdate::for_subject("urn:x:y").insert_literal(PROP_HAS_TITLE, "t"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidIdentifier);
    }

    #[tokio::test]
    async fn test_concurrent_creates_conflict_at_commit() {
        let backend = Arc::new(InMemoryBackend::new());
        let p = path("queue/q1");
        let mut first = Session::new(backend.clone());
        let mut second = Session::new(backend.clone());

        first.create_object(&p, NodeType::QueueItem).await.unwrap();
        second.create_object(&p, NodeType::QueueItem).await.unwrap();

        first.save().await.unwrap();
        let err = second.save().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_read_datastream_absent_is_none() {
        let backend = Arc::new(InMemoryBackend::new());
        let session = Session::new(backend);
        let content = session
            .read_datastream(&path("entities/e1/version-1/DESCRIPTIVE"))
            .await
            .unwrap();
        assert!(content.is_none());
    }
}
