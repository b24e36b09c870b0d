//! Storage Ports (Trait Interfaces)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Development: SQLite (zero-config, tantivy full-text)
//! - Testing: InMemory (fast unit tests)

use async_trait::async_trait;

use super::graph::{Change, Node, NodeType};
use super::paths::RepoPath;
use crate::error::Result;

/// Repository Backend Port
///
/// All storage backends must implement this trait. Reads observe committed
/// state only; staging and read-your-writes live in [`crate::Session`].
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Node at `path`, object or datastream
    async fn get_node(&self, path: &RepoPath) -> Result<Option<Node>>;

    /// Existence check for objects and datastreams
    async fn exists(&self, path: &RepoPath) -> Result<bool> {
        Ok(self.get_node(path).await?.is_some())
    }

    /// Apply a change log atomically.
    ///
    /// Either every change is applied or none is; a failing precondition
    /// (e.g. `CreateObject` on an existing path) aborts the whole commit.
    async fn commit(&self, changes: &[Change]) -> Result<()>;

    /// Full-text query scoped to one structural type.
    ///
    /// `offset`/`limit` of 0 mean unbounded. Text and query are split into
    /// lowercase alphanumeric tokens and every query token must appear in the
    /// node's text. No query syntax is interpreted; a query without tokens
    /// matches every node of the type.
    async fn full_text_search(
        &self,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>>;

    async fn stats(&self) -> Result<BackendStats>;
}

/// Backend statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub objects: usize,
    pub datastreams: usize,
    pub content_bytes: usize,
}

/// Source of file bytes for non-referenced ingest
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, uri: &str) -> Result<Vec<u8>>;
}
