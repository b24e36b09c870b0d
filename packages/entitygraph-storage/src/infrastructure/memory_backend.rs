//! In-Memory Repository Backend (for testing)
//!
//! Ordered map of nodes behind a single lock. Commits are atomic because the
//! whole change log is validated against a scratch overlay before anything
//! is written.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::{paginate, search_tokens, searchable_text};
use crate::domain::{BackendStats, Change, Node, NodeKind, NodeType, RepoPath, RepositoryBackend};
use crate::error::Result;

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    nodes: Arc<RwLock<BTreeMap<RepoPath, Node>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl RepositoryBackend for InMemoryBackend {
    async fn get_node(&self, path: &RepoPath) -> Result<Option<Node>> {
        Ok(self.nodes.read().get(path).cloned())
    }

    async fn commit(&self, changes: &[Change]) -> Result<()> {
        let mut nodes = self.nodes.write();
        let mut staged: HashMap<RepoPath, Option<Node>> = HashMap::new();

        for change in changes {
            let current = match staged.get(change.path()) {
                Some(node) => node.clone(),
                None => nodes.get(change.path()).cloned(),
            };
            let next = change.apply(current)?;
            staged.insert(change.path().clone(), next);
        }

        for (path, node) in staged {
            match node {
                Some(node) => {
                    nodes.insert(path, node);
                }
                None => {
                    nodes.remove(&path);
                }
            }
        }
        Ok(())
    }

    async fn full_text_search(
        &self,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        let nodes = self.nodes.read();
        let terms: Vec<String> = search_tokens(terms).collect();

        let matches = nodes.values().filter(|node| node.has_type(node_type)).filter(|node| {
            let text = searchable_text(
                node,
                nodes.values().filter(|n| n.path.is_descendant_of(&node.path)),
            );
            let tokens: HashSet<String> = search_tokens(&text).collect();
            terms.iter().all(|term| tokens.contains(term))
        });

        Ok(paginate(matches.map(|node| node.path.clone()), offset, limit))
    }

    async fn stats(&self) -> Result<BackendStats> {
        let nodes = self.nodes.read();
        let mut stats = BackendStats::default();
        for node in nodes.values() {
            match node.kind {
                NodeKind::Object => stats.objects += 1,
                NodeKind::Datastream => stats.datastreams += 1,
            }
            stats.content_bytes += node.content.as_ref().map_or(0, |c| c.bytes.len());
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::PROP_HAS_TITLE;
    use crate::domain::{Binary, GraphUpdate};
    use crate::error::ErrorKind;

    fn path(s: &str) -> RepoPath {
        RepoPath::parse(s).unwrap()
    }

    fn create(p: &str, node_type: NodeType) -> Change {
        Change::CreateObject {
            path: path(p),
            node_types: vec![node_type],
        }
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let backend = InMemoryBackend::new();
        backend
            .commit(&[create("entities/e1", NodeType::IntellectualEntity)])
            .await
            .unwrap();

        let err = backend
            .commit(&[
                create("entities/e2", NodeType::IntellectualEntity),
                create("entities/e1", NodeType::IntellectualEntity),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(!backend.exists(&path("entities/e2")).await.unwrap());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_search_scoped_by_type_with_pagination() {
        let backend = InMemoryBackend::new();
        let mut changes = Vec::new();
        for i in 0..5 {
            let p = format!("entities/e{}", i);
            changes.push(create(&p, NodeType::IntellectualEntity));
            changes.push(Change::UpdateGraph {
                path: path(&p),
                update: GraphUpdate::for_path(&path(&p))
                    .insert_literal(PROP_HAS_TITLE, format!("Shared Title {}", i)),
            });
        }
        changes.push(create("entities/e0/version-1", NodeType::Version));
        changes.push(create("entities/e0/version-1/r1", NodeType::Representation));
        backend.commit(&changes).await.unwrap();

        let all = backend
            .full_text_search(NodeType::IntellectualEntity, "shared title", 0, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let page = backend
            .full_text_search(NodeType::IntellectualEntity, "shared", 1, 2)
            .await
            .unwrap();
        assert_eq!(page, all[1..3].to_vec());

        let reps = backend
            .full_text_search(NodeType::Representation, "", 0, 0)
            .await
            .unwrap();
        assert_eq!(reps, vec![path("entities/e0/version-1/r1")]);
    }

    #[tokio::test]
    async fn test_search_reads_metadata_beneath_node() {
        let backend = InMemoryBackend::new();
        backend
            .commit(&[
                create("entities/e1", NodeType::IntellectualEntity),
                create("entities/e1/version-1", NodeType::Version),
                Change::WriteContent {
                    path: path("entities/e1/version-1/DESCRIPTIVE"),
                    node_types: vec![NodeType::Metadata],
                    content: Binary::new("application/json", br#"{"title":"Moby Dick"}"#.to_vec()),
                },
            ])
            .await
            .unwrap();

        let hits = backend
            .full_text_search(NodeType::IntellectualEntity, "moby", 0, 0)
            .await
            .unwrap();
        assert_eq!(hits, vec![path("entities/e1")]);
    }

    #[tokio::test]
    async fn test_stats() {
        let backend = InMemoryBackend::new();
        backend
            .commit(&[
                create("queue", NodeType::Queue),
                Change::WriteContent {
                    path: path("queue/q1"),
                    node_types: vec![NodeType::QueueItem],
                    content: Binary::new("application/json", b"{}".to_vec()),
                },
            ])
            .await
            .unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.datastreams, 1);
        assert_eq!(stats.content_bytes, 2);
    }
}
