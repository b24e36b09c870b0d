//! RDF vocabulary for persisted property graphs.
//!
//! IRIs are part of the persisted layout; never rename a constant's value.

/// IRI in the model namespace
macro_rules! model_iri {
    ($local:literal) => {
        concat!("https://ns.entitygraph.dev/model#", $local)
    };
}

/// Model namespace IRI prefix.
pub const MODEL_NS: &str = model_iri!("");

/// Prefix used when rendering node types.
pub const MODEL_PREFIX: &str = "eg";

// Structure
pub const PROP_HAS_VERSION: &str = model_iri!("hasVersion");
pub const PROP_CURRENT_VERSION: &str = model_iri!("currentVersion");
pub const PROP_HAS_REPRESENTATION: &str = model_iri!("hasRepresentation");
pub const PROP_HAS_FILE: &str = model_iri!("hasFile");
pub const PROP_HAS_BITSTREAM: &str = model_iri!("hasBitStream");

// Descriptive properties
pub const PROP_HAS_TYPE: &str = model_iri!("hasType");
pub const PROP_HAS_SCHEMA: &str = model_iri!("hasSchema");
pub const PROP_HAS_TITLE: &str = model_iri!("hasTitle");
pub const PROP_HAS_FILENAME: &str = model_iri!("hasFileName");
pub const PROP_HAS_MIMETYPE: &str = model_iri!("hasMimeType");
pub const PROP_HAS_INGEST_SOURCE: &str = model_iri!("hasIngestSource");
pub const PROP_HAS_REFERENCED_CONTENT: &str = model_iri!("hasReferencedContent");
pub const PROP_HAS_BITSTREAM_TYPE: &str = model_iri!("hasBitstreamType");
pub const PROP_HAS_CHECKSUM: &str = model_iri!("hasChecksum");

// Lifecycle
pub const PROP_HAS_LIFECYCLE_STATE: &str = model_iri!("hasLifeCycleState");
pub const PROP_HAS_LIFECYCLE_DETAILS: &str = model_iri!("hasLifeCycleStateDetails");

// Queue
pub const PROP_HAS_ITEM: &str = model_iri!("hasItem");
pub const PROP_HAS_INGEST_STATE: &str = model_iri!("hasIngestState");

// `hasType` literals for structural nodes
pub const TYPE_INTELLECTUAL_ENTITY: &str = "intellectualentity";
pub const TYPE_REPRESENTATION: &str = "representation";
pub const TYPE_FILE: &str = "file";
pub const TYPE_BITSTREAM: &str = "bitstream";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_share_model_namespace() {
        for predicate in [
            PROP_HAS_VERSION,
            PROP_CURRENT_VERSION,
            PROP_HAS_REFERENCED_CONTENT,
            PROP_HAS_LIFECYCLE_DETAILS,
            PROP_HAS_ITEM,
        ] {
            assert!(predicate.starts_with(MODEL_NS), "{}", predicate);
        }
        assert_eq!(PROP_HAS_ITEM, "https://ns.entitygraph.dev/model#hasItem");
    }
}
