//! EntityGraph Storage: versioned entity persistence
//!
//! Stores hierarchical intellectual entities (entity → representation →
//! file → bitstream, each with typed metadata slots) in a path-addressed
//! repository of objects and datastreams with RDF property graphs.
//!
//! ## Core Principles
//!
//! 1. **Immutable versions**: every update writes `version-{n+1}`; history is never rewritten
//! 2. **Single current pointer**: the entity node references exactly one current version
//! 3. **Unit of work**: writes are staged in a [`Session`] and committed once
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entitygraph_storage::{EntityStore, InMemoryBackend, IntellectualEntity, StoreConfig};
//!
//! let store = EntityStore::new(Arc::new(InMemoryBackend::new()), StoreConfig::default());
//! let mut session = store.session();
//!
//! // 1. Ingest (version-1)
//! let id = store.add_entity(&mut session, &entity, None).await?;
//!
//! // 2. Update (version-2, current pointer moves)
//! store.update_entity(&mut session, &id, &revised).await?;
//!
//! // 3. Read current or historical versions
//! let current = store.fetch_entity(&session, &id, None).await?;
//! let original = store.fetch_entity(&session, &id, Some(1)).await?;
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod session;

pub use api::{EntityStore, MetadataTarget};
pub use config::{StoreConfig, StoredFileRef};
pub use error::{ErrorKind, Result, StorageError};
pub use session::Session;

// Domain re-exports
pub use domain::{
    classify, BinaryContent, BitStream, BitStreamType, Classification, ContentLoader,
    EntityCollection, File, IntellectualEntity, LifecycleState, LifecycleStatus, Metadata,
    MetadataSlot, NodeType, RepoPath, Representation, RepositoryBackend, VersionList,
};

pub use infrastructure::{InMemoryBackend, LocalFileLoader};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteBackend;
