//! Repository node model
//!
//! A node is either a structural object or a datastream. Both carry node
//! types and an RDF property graph about their own subject; datastreams also
//! carry content. Writes are expressed as a log of [`Change`]s which every
//! backend applies with the same [`Change::apply`] semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::paths::{subject_for, RepoPath};
use super::vocab::MODEL_PREFIX;
use crate::error::{Result, StorageError};

/// Structural node type (mixin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    IntellectualEntity,
    Version,
    Representation,
    File,
    Bitstream,
    Metadata,
    BinaryData,
    Queue,
    QueueItem,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::IntellectualEntity => "intellectual-entity",
            NodeType::Version => "version",
            NodeType::Representation => "representation",
            NodeType::File => "file",
            NodeType::Bitstream => "bitstream",
            NodeType::Metadata => "metadata",
            NodeType::BinaryData => "binary-data",
            NodeType::Queue => "queue",
            NodeType::QueueItem => "queue-item",
        }
    }

    /// Types the full-text index is scoped to
    pub fn is_searchable(&self) -> bool {
        matches!(
            self,
            NodeType::IntellectualEntity | NodeType::Representation | NodeType::File
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", MODEL_PREFIX, self.as_str())
    }
}

/// Object of an RDF statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RdfTerm {
    Resource(String),
    Literal(String),
}

impl RdfTerm {
    pub fn resource(uri: impl Into<String>) -> Self {
        RdfTerm::Resource(uri.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        RdfTerm::Literal(value.into())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            RdfTerm::Literal(v) => Some(v),
            RdfTerm::Resource(_) => None,
        }
    }

    pub fn as_resource(&self) -> Option<&str> {
        match self {
            RdfTerm::Resource(uri) => Some(uri),
            RdfTerm::Literal(_) => None,
        }
    }
}

/// Triple about a single subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub predicate: String,
    pub object: RdfTerm,
}

/// Properties of one subject, in insertion order with set semantics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGraph {
    statements: Vec<Statement>,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Insert a statement; inserting an existing statement is a no-op
    pub fn insert(&mut self, predicate: &str, object: RdfTerm) {
        let exists = self
            .statements
            .iter()
            .any(|s| s.predicate == predicate && s.object == object);
        if !exists {
            self.statements.push(Statement {
                predicate: predicate.to_string(),
                object,
            });
        }
    }

    pub fn remove(&mut self, pattern: &Pattern) {
        self.statements.retain(|s| !pattern.matches(s));
    }

    pub fn objects<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a RdfTerm> + 'a {
        self.statements
            .iter()
            .filter(move |s| s.predicate == predicate)
            .map(|s| &s.object)
    }

    pub fn resources<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.objects(predicate).filter_map(RdfTerm::as_resource)
    }

    pub fn literals<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.objects(predicate).filter_map(RdfTerm::as_literal)
    }

    pub fn first_literal<'a>(&'a self, predicate: &'a str) -> Option<&'a str> {
        self.literals(predicate).next()
    }

    /// Exactly one literal, else `CorruptState`
    pub fn single_literal<'a>(&'a self, predicate: &'a str) -> Result<&'a str> {
        let mut values = self.literals(predicate);
        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(StorageError::corrupt_state(format!(
                "Missing value for {}",
                predicate
            ))),
            (Some(_), Some(_)) => Err(StorageError::corrupt_state(format!(
                "Multiple values for {}",
                predicate
            ))),
        }
    }

    /// All literal values, used as searchable text
    pub fn literal_text(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().filter_map(|s| s.object.as_literal())
    }
}

/// Delete pattern; `object: None` matches every value of the predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub predicate: String,
    pub object: Option<RdfTerm>,
}

impl Pattern {
    pub fn matches(&self, statement: &Statement) -> bool {
        statement.predicate == self.predicate
            && self.object.as_ref().map_or(true, |o| *o == statement.object)
    }
}

/// Insert/delete script against one subject. Deletes apply before inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub subject: String,
    pub deletes: Vec<Pattern>,
    pub inserts: Vec<Statement>,
}

impl GraphUpdate {
    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            deletes: Vec::new(),
            inserts: Vec::new(),
        }
    }

    pub fn for_path(path: &RepoPath) -> Self {
        Self::for_subject(subject_for(path))
    }

    pub fn insert(mut self, predicate: &str, object: RdfTerm) -> Self {
        self.inserts.push(Statement {
            predicate: predicate.to_string(),
            object,
        });
        self
    }

    pub fn insert_literal(self, predicate: &str, value: impl Into<String>) -> Self {
        self.insert(predicate, RdfTerm::literal(value))
    }

    pub fn insert_resource(self, predicate: &str, uri: impl Into<String>) -> Self {
        self.insert(predicate, RdfTerm::resource(uri))
    }

    pub fn delete(mut self, predicate: &str, object: RdfTerm) -> Self {
        self.deletes.push(Pattern {
            predicate: predicate.to_string(),
            object: Some(object),
        });
        self
    }

    pub fn delete_all(mut self, predicate: &str) -> Self {
        self.deletes.push(Pattern {
            predicate: predicate.to_string(),
            object: None,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.inserts.is_empty()
    }

    pub fn apply_to(&self, graph: &mut PropertyGraph) {
        for pattern in &self.deletes {
            graph.remove(pattern);
        }
        for statement in &self.inserts {
            graph.insert(&statement.predicate, statement.object.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Object,
    Datastream,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Object => "object",
            NodeKind::Datastream => "datastream",
        }
    }
}

/// Datastream content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub path: RepoPath,
    pub kind: NodeKind,
    pub node_types: Vec<NodeType>,
    pub properties: PropertyGraph,
    pub content: Option<Binary>,
}

impl Node {
    pub fn object(path: RepoPath, node_types: &[NodeType]) -> Self {
        Self {
            path,
            kind: NodeKind::Object,
            node_types: node_types.to_vec(),
            properties: PropertyGraph::new(),
            content: None,
        }
    }

    pub fn datastream(path: RepoPath, node_types: &[NodeType], content: Binary) -> Self {
        Self {
            path,
            kind: NodeKind::Datastream,
            node_types: node_types.to_vec(),
            properties: PropertyGraph::new(),
            content: Some(content),
        }
    }

    pub fn subject(&self) -> String {
        subject_for(&self.path)
    }

    pub fn has_type(&self, node_type: NodeType) -> bool {
        self.node_types.contains(&node_type)
    }

    pub fn add_types(&mut self, node_types: &[NodeType]) {
        for t in node_types {
            if !self.node_types.contains(t) {
                self.node_types.push(*t);
            }
        }
    }
}

/// One staged mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create a bare object; fails with `Conflict` when the path is taken
    CreateObject {
        path: RepoPath,
        node_types: Vec<NodeType>,
    },
    /// Create a datastream; fails with `Conflict` when the path is taken
    CreateDatastream {
        path: RepoPath,
        node_types: Vec<NodeType>,
        content: Binary,
    },
    /// Create or open a datastream and replace its content
    WriteContent {
        path: RepoPath,
        node_types: Vec<NodeType>,
        content: Binary,
    },
    /// Apply an insert/delete script to an existing node
    UpdateGraph { path: RepoPath, update: GraphUpdate },
    /// Remove a single node
    Delete { path: RepoPath },
}

impl Change {
    pub fn path(&self) -> &RepoPath {
        match self {
            Change::CreateObject { path, .. }
            | Change::CreateDatastream { path, .. }
            | Change::WriteContent { path, .. }
            | Change::UpdateGraph { path, .. }
            | Change::Delete { path } => path,
        }
    }

    /// New state of the node at [`Change::path`] given its current state
    pub fn apply(&self, current: Option<Node>) -> Result<Option<Node>> {
        match self {
            Change::CreateObject { path, node_types } => match current {
                Some(_) => Err(StorageError::conflict(format!(
                    "Node already exists: {}",
                    path
                ))),
                None => Ok(Some(Node::object(path.clone(), node_types))),
            },
            Change::CreateDatastream {
                path,
                node_types,
                content,
            } => match current {
                Some(_) => Err(StorageError::conflict(format!(
                    "Node already exists: {}",
                    path
                ))),
                None => Ok(Some(Node::datastream(
                    path.clone(),
                    node_types,
                    content.clone(),
                ))),
            },
            Change::WriteContent {
                path,
                node_types,
                content,
            } => match current {
                Some(node) if node.kind == NodeKind::Object => Err(StorageError::conflict(
                    format!("Path is occupied by an object: {}", path),
                )),
                Some(mut node) => {
                    node.add_types(node_types);
                    node.content = Some(content.clone());
                    Ok(Some(node))
                }
                None => Ok(Some(Node::datastream(
                    path.clone(),
                    node_types,
                    content.clone(),
                ))),
            },
            Change::UpdateGraph { path, update } => match current {
                Some(mut node) => {
                    update.apply_to(&mut node.properties);
                    Ok(Some(node))
                }
                None => Err(StorageError::not_found(path)),
            },
            Change::Delete { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const P: &str = "https://example.org/p";

    fn path(s: &str) -> RepoPath {
        RepoPath::parse(s).unwrap()
    }

    #[test]
    fn test_property_graph_set_semantics_and_order() {
        let mut graph = PropertyGraph::new();
        graph.insert(P, RdfTerm::resource("info:a"));
        graph.insert(P, RdfTerm::resource("info:b"));
        graph.insert(P, RdfTerm::resource("info:a"));

        let values: Vec<_> = graph.resources(P).collect();
        assert_eq!(values, vec!["info:a", "info:b"]);
    }

    #[test]
    fn test_single_literal_cardinality() {
        let mut graph = PropertyGraph::new();
        assert_eq!(graph.single_literal(P).unwrap_err().kind, ErrorKind::CorruptState);

        graph.insert(P, RdfTerm::literal("one"));
        assert_eq!(graph.single_literal(P).unwrap(), "one");

        graph.insert(P, RdfTerm::literal("two"));
        assert_eq!(graph.single_literal(P).unwrap_err().kind, ErrorKind::CorruptState);
    }

    #[test]
    fn test_graph_update_deletes_before_inserts() {
        let mut graph = PropertyGraph::new();
        graph.insert(P, RdfTerm::literal("old"));

        GraphUpdate::for_subject("info:x")
            .delete_all(P)
            .insert_literal(P, "new")
            .apply_to(&mut graph);

        assert_eq!(graph.literals(P).collect::<Vec<_>>(), vec!["new"]);
    }

    #[test]
    fn test_create_object_conflicts_on_existing_node() {
        let p = path("entities/e1");
        let create = Change::CreateObject {
            path: p.clone(),
            node_types: vec![NodeType::IntellectualEntity],
        };

        let created = create.apply(None).unwrap().unwrap();
        assert!(created.has_type(NodeType::IntellectualEntity));

        let err = create.apply(Some(created)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn test_write_content_opens_existing_datastream() {
        let p = path("entities/e1/version-1/DESCRIPTIVE");
        let first = Change::WriteContent {
            path: p.clone(),
            node_types: vec![NodeType::Metadata],
            content: Binary::new("application/json", b"{}".to_vec()),
        }
        .apply(None)
        .unwrap();

        let second = Change::WriteContent {
            path: p.clone(),
            node_types: vec![NodeType::Metadata],
            content: Binary::new("application/json", b"[]".to_vec()),
        }
        .apply(first)
        .unwrap()
        .unwrap();

        assert_eq!(second.kind, NodeKind::Datastream);
        assert_eq!(second.node_types, vec![NodeType::Metadata]);
        assert_eq!(second.content.unwrap().bytes, b"[]".to_vec());
    }

    #[test]
    fn test_create_datastream_conflicts_on_existing_node() {
        let p = path("queue/q1");
        let create = Change::CreateDatastream {
            path: p.clone(),
            node_types: vec![NodeType::QueueItem],
            content: Binary::new("application/json", b"{}".to_vec()),
        };
        let created = create.apply(None).unwrap();
        assert_eq!(created.as_ref().map(|n| n.kind), Some(NodeKind::Datastream));
        assert_eq!(create.apply(created).unwrap_err().kind, ErrorKind::Conflict);
    }

    #[test]
    fn test_update_graph_requires_existing_node() {
        let p = path("entities/missing");
        let err = Change::UpdateGraph {
            path: p.clone(),
            update: GraphUpdate::for_path(&p).insert_literal(P, "x"),
        }
        .apply(None)
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_node_type_display() {
        assert_eq!(NodeType::IntellectualEntity.to_string(), "eg:intellectual-entity");
        assert!(NodeType::File.is_searchable());
        assert!(!NodeType::Metadata.is_searchable());
    }
}
