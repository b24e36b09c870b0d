//! Version resolution
//!
//! The entity node carries `hasVersion` links in insertion order and exactly
//! one `currentVersion` link. Version numbers are taken from the
//! `version-{n}` path suffix.

use crate::domain::vocab::{PROP_CURRENT_VERSION, PROP_HAS_VERSION};
use crate::domain::{path_from_subject, PropertyGraph, RepoPath, VersionList};
use crate::error::{Result, StorageError};
use crate::session::Session;

/// Path of the single current version referenced by an entity graph
pub fn current_version_path(entity_graph: &PropertyGraph) -> Result<RepoPath> {
    let mut pointers = entity_graph.resources(PROP_CURRENT_VERSION);
    match (pointers.next(), pointers.next()) {
        (Some(subject), None) => path_from_subject(subject),
        (None, _) => Err(StorageError::corrupt_state(
            "Entity has no current version pointer",
        )),
        (Some(_), Some(_)) => Err(StorageError::corrupt_state(
            "Entity has multiple current version pointers",
        )),
    }
}

/// Version subjects, oldest first
pub fn version_uris(entity_graph: &PropertyGraph) -> Vec<String> {
    entity_graph
        .resources(PROP_HAS_VERSION)
        .map(str::to_string)
        .collect()
}

pub async fn version_list(session: &Session, entity_id: &str) -> Result<VersionList> {
    let entity = session.require_object(&RepoPath::entity(entity_id)?).await?;
    Ok(VersionList {
        entity_id: entity_id.to_string(),
        versions: version_uris(&entity.properties),
    })
}

/// Requested version, or the current one when `version` is `None`
pub async fn resolve_version_path(
    session: &Session,
    entity_id: &str,
    version: Option<u32>,
) -> Result<RepoPath> {
    let entity = session.require_object(&RepoPath::entity(entity_id)?).await?;
    match version {
        Some(n) => {
            let path = RepoPath::version(entity_id, n)?;
            session.require_object(&path).await?;
            Ok(path)
        }
        None => current_version_path(&entity.properties),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{subject_for, RdfTerm};
    use crate::error::ErrorKind;

    fn graph_with(pointers: &[u32], versions: &[u32]) -> PropertyGraph {
        let mut graph = PropertyGraph::new();
        for n in versions {
            let subject = subject_for(&RepoPath::version("e1", *n).unwrap());
            graph.insert(PROP_HAS_VERSION, RdfTerm::resource(subject));
        }
        for n in pointers {
            let subject = subject_for(&RepoPath::version("e1", *n).unwrap());
            graph.insert(PROP_CURRENT_VERSION, RdfTerm::resource(subject));
        }
        graph
    }

    #[test]
    fn test_single_pointer_resolves() {
        let graph = graph_with(&[2], &[1, 2]);
        let path = current_version_path(&graph).unwrap();
        assert_eq!(path.as_str(), "entities/e1/version-2");
        assert_eq!(path.version_number().unwrap(), 2);
    }

    #[test]
    fn test_missing_or_duplicate_pointer_is_corrupt() {
        let err = current_version_path(&graph_with(&[], &[1])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptState);

        let err = current_version_path(&graph_with(&[1, 2], &[1, 2])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptState);
    }

    #[test]
    fn test_version_uris_keep_insertion_order() {
        let uris = version_uris(&graph_with(&[3], &[1, 2, 3]));
        assert_eq!(
            uris,
            vec![
                "info:entitygraph/entities/e1/version-1",
                "info:entitygraph/entities/e1/version-2",
                "info:entitygraph/entities/e1/version-3",
            ]
        );
    }
}
