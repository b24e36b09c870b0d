//! Path/URI resolution
//!
//! Every addressable node lives at a canonical repository path:
//!
//! ```text
//! entities/{id}
//! entities/{id}/version-{n}
//! entities/{id}/version-{n}/{repId}/{fileId}/{bsId}
//! {path}/DESCRIPTIVE|TECHNICAL|SOURCE|PROVENANCE|RIGHTS
//! {filePath}/DATA
//! queue
//! queue/{id}
//! ```
//!
//! Subjects are opaque URIs derived from the path; resolution is pure and
//! round-trips for every valid path.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metadata::MetadataSlot;
use crate::error::{Result, StorageError};

pub const ENTITY_ROOT: &str = "entities";
pub const QUEUE_ROOT: &str = "queue";
pub const DATA_SEGMENT: &str = "DATA";
pub const SUBJECT_PREFIX: &str = "info:entitygraph/";

const VERSION_PREFIX: &str = "version-";

/// Validate an externally supplied or generated identifier component.
///
/// The id must survive percent-encoding unchanged and must not shadow a
/// reserved segment (metadata slot names, `DATA`).
pub fn validate_identifier(id: &str) -> Result<()> {
    validate_segment(id)?;
    if id == DATA_SEGMENT || id.parse::<MetadataSlot>().is_ok() {
        return Err(StorageError::invalid_identifier(id));
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(StorageError::invalid_identifier(segment));
    }
    if urlencoding::encode(segment) != segment {
        return Err(StorageError::invalid_identifier(segment));
    }
    Ok(())
}

/// Canonical repository path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        for segment in path.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(path))
    }

    pub fn entity(entity_id: &str) -> Result<Self> {
        validate_identifier(entity_id)?;
        Ok(Self(format!("{}/{}", ENTITY_ROOT, entity_id)))
    }

    pub fn version(entity_id: &str, version: u32) -> Result<Self> {
        if version == 0 {
            return Err(StorageError::not_found(format!(
                "version 0 of entity {}",
                entity_id
            )));
        }
        Ok(Self(format!(
            "{}/{}{}",
            Self::entity(entity_id)?.0,
            VERSION_PREFIX,
            version
        )))
    }

    pub fn queue() -> Self {
        Self(QUEUE_ROOT.to_string())
    }

    pub fn queue_item(item_id: &str) -> Result<Self> {
        validate_identifier(item_id)?;
        Ok(Self(format!("{}/{}", QUEUE_ROOT, item_id)))
    }

    /// Child object addressed by a validated identifier
    pub fn child(&self, id: &str) -> Result<Self> {
        validate_identifier(id)?;
        Ok(Self(format!("{}/{}", self.0, id)))
    }

    /// Metadata datastream attached to this node
    pub fn metadata(&self, slot: MetadataSlot) -> Self {
        Self(format!("{}/{}", self.0, slot.as_str()))
    }

    /// Binary datastream of a file node
    pub fn data(&self) -> Self {
        Self(format!("{}/{}", self.0, DATA_SEGMENT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// True for strict descendants of `ancestor`
    pub fn is_descendant_of(&self, ancestor: &RepoPath) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// Entity id for any path under `entities/`
    pub fn entity_id(&self) -> Option<&str> {
        let mut segments = self.segments();
        match (segments.next(), segments.next()) {
            (Some(ENTITY_ROOT), Some(id)) => Some(id),
            _ => None,
        }
    }

    /// Version number when the last segment is `version-{n}`.
    ///
    /// The suffix must be a decimal integer >= 1.
    pub fn version_number(&self) -> Result<u32> {
        let last = self.last_segment();
        let digits = last.strip_prefix(VERSION_PREFIX).ok_or_else(|| {
            StorageError::corrupt_state(format!("Not a version path: {}", self.0))
        })?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StorageError::corrupt_state(format!(
                "Malformed version suffix: {}",
                self.0
            )));
        }
        match digits.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(StorageError::corrupt_state(format!(
                "Version number out of range: {}",
                self.0
            ))),
        }
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

/// Structured address of a node, resolved with [`path_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAddress<'a> {
    Entity {
        entity_id: &'a str,
    },
    Version {
        entity_id: &'a str,
        version: u32,
    },
    Representation {
        entity_id: &'a str,
        version: u32,
        rep_id: &'a str,
    },
    File {
        entity_id: &'a str,
        version: u32,
        rep_id: &'a str,
        file_id: &'a str,
    },
    Bitstream {
        entity_id: &'a str,
        version: u32,
        rep_id: &'a str,
        file_id: &'a str,
        bitstream_id: &'a str,
    },
    Queue,
    QueueItem {
        item_id: &'a str,
    },
}

pub fn path_for(address: &NodeAddress<'_>) -> Result<RepoPath> {
    match *address {
        NodeAddress::Entity { entity_id } => RepoPath::entity(entity_id),
        NodeAddress::Version { entity_id, version } => RepoPath::version(entity_id, version),
        NodeAddress::Representation {
            entity_id,
            version,
            rep_id,
        } => RepoPath::version(entity_id, version)?.child(rep_id),
        NodeAddress::File {
            entity_id,
            version,
            rep_id,
            file_id,
        } => RepoPath::version(entity_id, version)?
            .child(rep_id)?
            .child(file_id),
        NodeAddress::Bitstream {
            entity_id,
            version,
            rep_id,
            file_id,
            bitstream_id,
        } => RepoPath::version(entity_id, version)?
            .child(rep_id)?
            .child(file_id)?
            .child(bitstream_id),
        NodeAddress::Queue => Ok(RepoPath::queue()),
        NodeAddress::QueueItem { item_id } => RepoPath::queue_item(item_id),
    }
}

pub fn subject_for(path: &RepoPath) -> String {
    format!("{}{}", SUBJECT_PREFIX, path.0)
}

pub fn path_from_subject(subject: &str) -> Result<RepoPath> {
    let path = subject
        .strip_prefix(SUBJECT_PREFIX)
        .ok_or_else(|| StorageError::invalid_identifier(subject))?;
    RepoPath::parse(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_layout_paths() {
        let file = path_for(&NodeAddress::File {
            entity_id: "e1",
            version: 2,
            rep_id: "r1",
            file_id: "f1",
        })
        .unwrap();
        assert_eq!(file.as_str(), "entities/e1/version-2/r1/f1");
        assert_eq!(file.data().as_str(), "entities/e1/version-2/r1/f1/DATA");
        assert_eq!(
            file.metadata(MetadataSlot::Technical).as_str(),
            "entities/e1/version-2/r1/f1/TECHNICAL"
        );
        assert_eq!(RepoPath::queue_item("q1").unwrap().as_str(), "queue/q1");
        assert_eq!(path_for(&NodeAddress::Queue).unwrap().as_str(), "queue");
    }

    #[test]
    fn test_rejects_separator_and_reserved_ids() {
        for bad in ["a/b", "", "..", "a b", "x?y", "DATA", "TECHNICAL", "ü"] {
            let err = RepoPath::entity(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidIdentifier, "id {:?}", bad);
        }
        assert!(RepoPath::entity("entity-1_a.b~c").is_ok());
    }

    #[test]
    fn test_version_number_parsing() {
        let v = RepoPath::version("e1", 12).unwrap();
        assert_eq!(v.version_number().unwrap(), 12);

        for bad in ["entities/e1/version-0", "entities/e1/version-x", "entities/e1/v1"] {
            let err = RepoPath::parse(bad).unwrap().version_number().unwrap_err();
            assert_eq!(err.kind, ErrorKind::CorruptState);
        }
        assert_eq!(
            RepoPath::version("e1", 0).unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_subject_round_trip_and_foreign_subjects() {
        let path = RepoPath::version("e1", 1).unwrap();
        let subject = subject_for(&path);
        assert_eq!(subject, "info:entitygraph/entities/e1/version-1");
        assert_eq!(path_from_subject(&subject).unwrap(), path);

        let err = path_from_subject("http://elsewhere/entities/e1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_ancestry() {
        let entity = RepoPath::entity("e1").unwrap();
        let version = RepoPath::version("e1", 1).unwrap();
        let other = RepoPath::entity("e10").unwrap();

        assert!(version.is_descendant_of(&entity));
        assert!(!other.is_descendant_of(&entity));
        assert!(!entity.is_descendant_of(&entity));
        assert_eq!(version.parent(), Some(entity));
        assert_eq!(version.entity_id(), Some("e1"));
        assert_eq!(RepoPath::queue().entity_id(), None);
    }

    proptest! {
        #[test]
        fn prop_subject_round_trip(
            entity in "[A-Za-z0-9._~-]{1,16}",
            rep in "[a-z0-9-]{1,12}",
            version in 1u32..10_000,
        ) {
            prop_assume!(validate_identifier(&entity).is_ok());
            let path = path_for(&NodeAddress::Representation {
                entity_id: &entity,
                version,
                rep_id: &rep,
            }).unwrap();
            prop_assert_eq!(path_from_subject(&subject_for(&path)).unwrap(), path.clone());
            prop_assert_eq!(path.depth(), 4);
        }
    }
}
