//! Search Gateway
//!
//! Full-text queries scoped to one structural type. An `offset` or `limit`
//! of 0 means unbounded; results keep the backend's order.

use tracing::debug;

use super::entity_store::EntityStore;
use crate::domain::{NodeType, RepoPath};
use crate::error::{Result, StorageError};
use crate::session::Session;

impl EntityStore {
    pub async fn search_by_type(
        &self,
        session: &Session,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        if !node_type.is_searchable() {
            return Err(StorageError::unsupported_operation(format!(
                "Full-text search is not available for {}",
                node_type
            )));
        }
        let paths = session
            .full_text_search(node_type, terms, offset, limit)
            .await?;
        debug!(
            node_type = node_type.as_str(),
            terms,
            offset,
            limit,
            hits = paths.len(),
            "Search completed"
        );
        Ok(paths)
    }

    pub async fn search_entities(
        &self,
        session: &Session,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        self.search_by_type(session, NodeType::IntellectualEntity, terms, offset, limit)
            .await
    }

    pub async fn search_representations(
        &self,
        session: &Session,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        self.search_by_type(session, NodeType::Representation, terms, offset, limit)
            .await
    }

    pub async fn search_files(
        &self,
        session: &Session,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        self.search_by_type(session, NodeType::File, terms, offset, limit)
            .await
    }
}
