//! Domain layer: paths, node model, entity aggregate, ports

pub mod graph;
pub mod metadata;
pub mod models;
pub mod paths;
pub mod ports;
pub mod vocab;

pub use graph::{
    Binary, Change, GraphUpdate, Node, NodeKind, NodeType, Pattern, PropertyGraph, RdfTerm,
    Statement,
};
pub use metadata::{classify, Classification, Metadata, MetadataSlot, METADATA_MIME_TYPE};
pub use models::{
    BinaryContent, BitStream, BitStreamType, EntityCollection, File, IntellectualEntity,
    LifecycleState, LifecycleStatus, Representation, VersionList, DEFAULT_MIME_TYPE,
};
pub use paths::{
    path_for, path_from_subject, subject_for, validate_identifier, NodeAddress, RepoPath,
};
pub use ports::{BackendStats, ContentLoader, RepositoryBackend};
