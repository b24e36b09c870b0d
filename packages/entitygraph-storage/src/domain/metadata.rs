//! Metadata payloads, slots and classification

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorageError};

/// MIME type of serialized metadata datastreams
pub const METADATA_MIME_TYPE: &str = "application/json";

/// Named metadata datastream attached to a structural node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataSlot {
    Descriptive,
    Technical,
    Source,
    Provenance,
    Rights,
}

impl MetadataSlot {
    pub const ALL: [MetadataSlot; 5] = [
        MetadataSlot::Descriptive,
        MetadataSlot::Technical,
        MetadataSlot::Source,
        MetadataSlot::Provenance,
        MetadataSlot::Rights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSlot::Descriptive => "DESCRIPTIVE",
            MetadataSlot::Technical => "TECHNICAL",
            MetadataSlot::Source => "SOURCE",
            MetadataSlot::Provenance => "PROVENANCE",
            MetadataSlot::Rights => "RIGHTS",
        }
    }
}

impl fmt::Display for MetadataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataSlot {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        MetadataSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| StorageError::unsupported_metadata_path(s))
    }
}

/// Schema-typed metadata payload.
///
/// Bodies are kept as opaque JSON documents; only the variant matters for
/// classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "kebab-case")]
pub enum Metadata {
    DublinCore(Value),
    GoogleBookSearch(Value),
    Fits(Value),
    AudioMd(Value),
    Marc21(Value),
    Mix(Value),
    VideoMd(Value),
    PremisProvenance(Value),
    PremisRights(Value),
    TextMd(Value),
    /// Payload of a schema this store does not know
    Other { root: String, body: Value },
}

impl Metadata {
    pub fn body(&self) -> &Value {
        match self {
            Metadata::DublinCore(v)
            | Metadata::GoogleBookSearch(v)
            | Metadata::Fits(v)
            | Metadata::AudioMd(v)
            | Metadata::Marc21(v)
            | Metadata::Mix(v)
            | Metadata::VideoMd(v)
            | Metadata::PremisProvenance(v)
            | Metadata::PremisRights(v)
            | Metadata::TextMd(v) => v,
            Metadata::Other { body, .. } => body,
        }
    }

    pub fn classify(&self) -> Classification {
        classify(self)
    }
}

/// `(type-name, schema-uri)` pair attached to a metadata datastream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub type_name: &'static str,
    pub schema_uri: &'static str,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        type_name: "unknown",
        schema_uri: "",
    };
}

type PayloadPredicate = fn(&Metadata) -> bool;

/// Ordered classification table; first match wins.
static CLASSIFICATION_TABLE: &[(PayloadPredicate, &str, &str)] = &[
    (
        |m: &Metadata| matches!(m, Metadata::DublinCore(_)),
        "dublin-core",
        "http://purl.org/dc/elements/1.1/",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::GoogleBookSearch(_)),
        "gbs",
        "http://books.google.com/gbs",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::Fits(_)),
        "fits",
        "http://hul.harvard.edu/ois/xml/ns/fits/fits_output",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::AudioMd(_)),
        "audiomd",
        "http://www.loc.gov/audioMD/",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::Marc21(_)),
        "marc21",
        "http://www.loc.gov/MARC21/slim",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::Mix(_)),
        "mix",
        "http://www.loc.gov/mix/v20",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::VideoMd(_)),
        "videomd",
        "http://www.loc.gov/videoMD/",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::PremisProvenance(_)),
        "premis-provenance",
        "info:lc/xmlns/premis-v2",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::PremisRights(_)),
        "premis-rights",
        "info:lc/xmlns/premis-v2",
    ),
    (
        |m: &Metadata| matches!(m, Metadata::TextMd(_)),
        "textmd",
        "info:lc/xmlns/textmd-v3",
    ),
];

pub fn classify(payload: &Metadata) -> Classification {
    CLASSIFICATION_TABLE
        .iter()
        .find(|(predicate, _, _)| predicate(payload))
        .map(|&(_, type_name, schema_uri)| Classification {
            type_name,
            schema_uri,
        })
        .unwrap_or(Classification::UNKNOWN)
}
