//! Application layer: entity mapping, version resolution, search

pub mod entity_store;
pub mod metadata_path;
mod search;
pub mod versions;

pub use entity_store::EntityStore;
pub use metadata_path::MetadataTarget;
pub use versions::{current_version_path, resolve_version_path, version_list, version_uris};
