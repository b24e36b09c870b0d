//! SQLite Repository Backend
//!
//! File-based persistent storage using SQLite. One row per node; the property
//! graph and node types are stored as JSON. Each commit runs in a single
//! transaction, after which the full-text index is refreshed for every
//! structural node the commit touched.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::search_index::{FullTextIndex, IndexedNode};
use super::searchable_text;
use crate::domain::{
    BackendStats, Binary, Change, Node, NodeKind, NodeType, PropertyGraph, RepoPath,
    RepositoryBackend,
};
use crate::error::{Result, StorageError};

/// SQLite-based RepositoryBackend implementation
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    index: Arc<FullTextIndex>,
}

impl SqliteBackend {
    /// Open (or create) a store at the given path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        let backend = Self::with_connection(conn)?;
        info!(path = %db_path.as_ref().display(), "Opened SQLite repository backend");
        Ok(backend)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
            index: Arc::new(FullTextIndex::in_ram()?),
        };
        backend.init_schema()?;
        backend.rebuild_index()?;
        Ok(backend)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                path TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                node_types TEXT NOT NULL,
                properties TEXT NOT NULL,
                mime_type TEXT,
                content BLOB,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Reindex every structural node from the database
    fn rebuild_index(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path FROM nodes WHERE kind = 'object' ORDER BY path",
        )?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let candidates = paths
            .into_iter()
            .map(RepoPath::parse)
            .collect::<Result<BTreeSet<_>>>()?;
        let (upserts, _) = index_entries(&conn, &candidates)?;
        debug!(documents = upserts.len(), "Rebuilt full-text index");
        self.index.apply(&upserts, &[])
    }

    /// Apply a change log in one transaction, then refresh the index for
    /// the touched structural nodes
    fn commit_blocking(&self, changes: &[Change]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut staged: HashMap<RepoPath, Option<Node>> = HashMap::new();
        for change in changes {
            let current = match staged.get(change.path()) {
                Some(node) => node.clone(),
                None => read_node(&tx, change.path())?,
            };
            let next = change.apply(current)?;
            staged.insert(change.path().clone(), next);
        }

        let now = chrono::Utc::now().timestamp();
        for (path, node) in &staged {
            match node {
                Some(node) => write_node(&tx, node, now)?,
                None => {
                    tx.execute("DELETE FROM nodes WHERE path = ?1", params![path.as_str()])?;
                }
            }
        }
        tx.commit()?;

        // Changed nodes and all their ancestors
        let mut candidates = BTreeSet::new();
        for path in staged.keys() {
            let mut current = Some(path.clone());
            while let Some(p) = current {
                current = p.parent();
                candidates.insert(p);
            }
        }
        let refreshed = index_entries(&conn, &candidates)
            .and_then(|(upserts, removals)| self.index.apply(&upserts, &removals));
        if let Err(e) = refreshed {
            // Committed data stays authoritative; the index is rebuilt on next open
            error!(error = %e, "Failed to refresh full-text index after commit");
        }
        Ok(())
    }
}

/// Row columns of `nodes` after `path`
type NodeRow = (String, String, String, Option<String>, Option<Vec<u8>>);

fn decode_node(path: RepoPath, row: NodeRow) -> Result<Node> {
    let (kind, node_types, properties, mime_type, content) = row;
    let kind = match kind.as_str() {
        "object" => NodeKind::Object,
        "datastream" => NodeKind::Datastream,
        other => {
            return Err(StorageError::corrupt_state(format!(
                "Unknown node kind {} at {}",
                other, path
            )))
        }
    };
    let node_types: Vec<NodeType> = serde_json::from_str(&node_types)?;
    let properties: PropertyGraph = serde_json::from_str(&properties)?;
    let content = match (mime_type, content) {
        (Some(mime_type), Some(bytes)) => Some(Binary { mime_type, bytes }),
        _ => None,
    };
    Ok(Node {
        path,
        kind,
        node_types,
        properties,
        content,
    })
}

fn read_node(conn: &Connection, path: &RepoPath) -> Result<Option<Node>> {
    let row = conn
        .query_row(
            "SELECT kind, node_types, properties, mime_type, content FROM nodes WHERE path = ?1",
            params![path.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            },
        )
        .optional()?;
    row.map(|row| decode_node(path.clone(), row)).transpose()
}

/// Every node stored strictly beneath `path`, as needed for search text.
/// Only metadata datastreams carry their content; binaries stay in the table.
fn read_search_descendants(conn: &Connection, path: &RepoPath) -> Result<Vec<Node>> {
    // '0' sorts right after '/', so this range is exactly the `path/` prefix
    let lower = format!("{}/", path);
    let upper = format!("{}0", path);
    let metadata_type = serde_json::to_string(&NodeType::Metadata)?;
    let mut stmt = conn.prepare(
        "SELECT path, kind, node_types, properties,
                CASE WHEN instr(node_types, ?3) > 0 THEN mime_type END,
                CASE WHEN instr(node_types, ?3) > 0 THEN content END
         FROM nodes WHERE path >= ?1 AND path < ?2 ORDER BY path",
    )?;
    let rows = stmt
        .query_map(params![lower, upper, metadata_type], |row| {
            Ok((
                row.get::<_, String>(0)?,
                (
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<Vec<u8>>>(5)?,
                ),
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(p, row)| decode_node(RepoPath::parse(p)?, row))
        .collect()
}

fn write_node(conn: &Connection, node: &Node, now: i64) -> Result<()> {
    let (mime_type, content) = match &node.content {
        Some(binary) => (Some(binary.mime_type.as_str()), Some(binary.bytes.as_slice())),
        None => (None, None),
    };
    conn.execute(
        "INSERT OR REPLACE INTO nodes (path, kind, node_types, properties, mime_type, content, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            node.path.as_str(),
            node.kind.as_str(),
            serde_json::to_string(&node.node_types)?,
            serde_json::to_string(&node.properties)?,
            mime_type,
            content,
            now,
        ],
    )?;
    Ok(())
}

/// Index documents for `candidates`: structural nodes to (re)index and
/// paths whose documents must go.
fn index_entries(
    conn: &Connection,
    candidates: &BTreeSet<RepoPath>,
) -> Result<(Vec<IndexedNode>, Vec<RepoPath>)> {
    let mut upserts = Vec::new();
    let mut removals = Vec::new();
    for path in candidates {
        match read_node(conn, path)? {
            Some(node) if node.kind == NodeKind::Object => {
                let Some(node_type) = node.node_types.iter().copied().find(NodeType::is_searchable)
                else {
                    continue;
                };
                let descendants = read_search_descendants(conn, path)?;
                upserts.push(IndexedNode {
                    path: path.clone(),
                    node_type,
                    text: searchable_text(&node, descendants.iter()),
                });
            }
            Some(_) => {}
            None => removals.push(path.clone()),
        }
    }
    Ok((upserts, removals))
}

#[async_trait]
impl RepositoryBackend for SqliteBackend {
    async fn get_node(&self, path: &RepoPath) -> Result<Option<Node>> {
        let conn = self.conn.lock();
        read_node(&conn, path)
    }

    async fn exists(&self, path: &RepoPath) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE path = ?1",
                params![path.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn commit(&self, changes: &[Change]) -> Result<()> {
        // rusqlite and the tantivy writer block; keep them off the runtime workers
        let backend = self.clone();
        let changes = changes.to_vec();
        tokio::task::spawn_blocking(move || backend.commit_blocking(&changes))
            .await
            .map_err(|e| StorageError::backend(format!("Commit task failed: {}", e)))?
    }

    async fn full_text_search(
        &self,
        node_type: NodeType,
        terms: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RepoPath>> {
        self.index.search(node_type, terms, offset, limit)
    }

    async fn stats(&self) -> Result<BackendStats> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(LENGTH(content)), 0) FROM nodes GROUP BY kind",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stats = BackendStats::default();
        for (kind, count, bytes) in rows {
            match kind.as_str() {
                "object" => stats.objects = count as usize,
                _ => stats.datastreams += count as usize,
            }
            stats.content_bytes += bytes as usize;
        }
        Ok(stats)
    }
}
