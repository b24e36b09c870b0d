//! Client metadata paths
//!
//! `{entity}/{SLOT}`, `{entity}/{rep}/{SLOT}`, `{entity}/{rep}/{file}/{SLOT}`
//! and `{entity}/{rep}/{file}/{bitstream}/{SLOT}`. The number of components
//! selects the target element; each level accepts a fixed set of slots.

use crate::domain::{validate_identifier, MetadataSlot, RepoPath};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataTarget {
    Entity {
        entity_id: String,
    },
    Representation {
        entity_id: String,
        rep_id: String,
        slot: MetadataSlot,
    },
    File {
        entity_id: String,
        rep_id: String,
        file_id: String,
    },
    Bitstream {
        entity_id: String,
        rep_id: String,
        file_id: String,
        bitstream_id: String,
    },
}

impl MetadataTarget {
    pub fn parse(path: &str) -> Result<Self> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        let (slot_name, ids) = match parts.split_last() {
            Some((slot, ids)) if (1..=4).contains(&ids.len()) => (*slot, ids),
            _ => return Err(StorageError::unsupported_metadata_path(path)),
        };
        let slot: MetadataSlot = slot_name
            .parse()
            .map_err(|_| StorageError::unsupported_metadata_path(path))?;
        for id in ids {
            validate_identifier(id)?;
        }
        let owned = |i: usize| ids[i].to_string();

        let target = match (ids.len(), slot) {
            (1, MetadataSlot::Descriptive) => MetadataTarget::Entity {
                entity_id: owned(0),
            },
            (2, MetadataSlot::Descriptive) => {
                return Err(StorageError::unsupported_metadata_path(path))
            }
            (2, slot) => MetadataTarget::Representation {
                entity_id: owned(0),
                rep_id: owned(1),
                slot,
            },
            (3, MetadataSlot::Technical) => MetadataTarget::File {
                entity_id: owned(0),
                rep_id: owned(1),
                file_id: owned(2),
            },
            (4, MetadataSlot::Technical) => MetadataTarget::Bitstream {
                entity_id: owned(0),
                rep_id: owned(1),
                file_id: owned(2),
                bitstream_id: owned(3),
            },
            _ => return Err(StorageError::unsupported_metadata_path(path)),
        };
        Ok(target)
    }

    pub fn entity_id(&self) -> &str {
        match self {
            MetadataTarget::Entity { entity_id }
            | MetadataTarget::Representation { entity_id, .. }
            | MetadataTarget::File { entity_id, .. }
            | MetadataTarget::Bitstream { entity_id, .. } => entity_id,
        }
    }

    pub fn slot(&self) -> MetadataSlot {
        match self {
            MetadataTarget::Entity { .. } => MetadataSlot::Descriptive,
            MetadataTarget::Representation { slot, .. } => *slot,
            MetadataTarget::File { .. } | MetadataTarget::Bitstream { .. } => {
                MetadataSlot::Technical
            }
        }
    }

    /// Datastream path under the given version
    pub fn datastream_path(&self, version_path: &RepoPath) -> Result<RepoPath> {
        let owner = match self {
            MetadataTarget::Entity { .. } => version_path.clone(),
            MetadataTarget::Representation { rep_id, .. } => version_path.child(rep_id)?,
            MetadataTarget::File {
                rep_id, file_id, ..
            } => version_path.child(rep_id)?.child(file_id)?,
            MetadataTarget::Bitstream {
                rep_id,
                file_id,
                bitstream_id,
                ..
            } => version_path
                .child(rep_id)?
                .child(file_id)?
                .child(bitstream_id)?,
        };
        Ok(owner.metadata(self.slot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_depth_dispatch() {
        assert_eq!(
            MetadataTarget::parse("e1/DESCRIPTIVE").unwrap(),
            MetadataTarget::Entity {
                entity_id: "e1".into()
            }
        );
        assert_eq!(
            MetadataTarget::parse("/e1/r1/RIGHTS/").unwrap().slot(),
            MetadataSlot::Rights
        );
        assert!(matches!(
            MetadataTarget::parse("e1/r1/f1/TECHNICAL").unwrap(),
            MetadataTarget::File { .. }
        ));
        assert!(matches!(
            MetadataTarget::parse("e1/r1/f1/b1/TECHNICAL").unwrap(),
            MetadataTarget::Bitstream { .. }
        ));
    }

    #[test]
    fn test_unsupported_paths() {
        for path in [
            "DESCRIPTIVE",
            "e1/r1/f1/b1/x/TECHNICAL",
            "e1/TECHNICAL",
            "e1/r1/DESCRIPTIVE",
            "e1/r1/f1/RIGHTS",
            "e1/r1/f1/b1/SOURCE",
            "e1/r1/SUMMARY",
        ] {
            let err = MetadataTarget::parse(path).unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnsupportedMetadataPath, "{}", path);
        }
    }

    #[test]
    fn test_datastream_path() {
        let version = RepoPath::version("e1", 4).unwrap();
        let target = MetadataTarget::parse("e1/r1/f1/TECHNICAL").unwrap();
        assert_eq!(
            target.datastream_path(&version).unwrap().as_str(),
            "entities/e1/version-4/r1/f1/TECHNICAL"
        );
        let entity = MetadataTarget::parse("e1/DESCRIPTIVE").unwrap();
        assert_eq!(
            entity.datastream_path(&version).unwrap().as_str(),
            "entities/e1/version-4/DESCRIPTIVE"
        );
    }
}
