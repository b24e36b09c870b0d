//! Entity aggregate models
//!
//! `IntellectualEntity` is the aggregate root. Updates never patch a stored
//! tree in place: callers fetch the entity, derive a new value with the
//! `with_*` / `splice_*` methods and persist it as the next version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::metadata::{Metadata, MetadataSlot};
use crate::error::{Result, StorageError};

/// Default MIME type for files without one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Coarse status of an entity as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    Ingested,
    Ingesting,
    IngestFailed,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Ingested => "INGESTED",
            LifecycleStatus::Ingesting => "INGESTING",
            LifecycleStatus::IngestFailed => "INGEST_FAILED",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INGESTED" => Ok(LifecycleStatus::Ingested),
            "INGESTING" => Ok(LifecycleStatus::Ingesting),
            "INGEST_FAILED" => Ok(LifecycleStatus::IngestFailed),
            other => Err(StorageError::corrupt_state(format!(
                "Unknown lifecycle state: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleState {
    pub state: LifecycleStatus,
    pub details: String,
}

impl LifecycleState {
    pub fn new(state: LifecycleStatus, details: impl Into<String>) -> Self {
        Self {
            state,
            details: details.into(),
        }
    }
}

/// Bitstream type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BitStreamType {
    #[default]
    Stream,
    Other(String),
}

impl BitStreamType {
    pub fn as_str(&self) -> &str {
        match self {
            BitStreamType::Stream => "STREAM",
            BitStreamType::Other(tag) => tag,
        }
    }
}

impl From<String> for BitStreamType {
    fn from(tag: String) -> Self {
        if tag == "STREAM" {
            BitStreamType::Stream
        } else {
            BitStreamType::Other(tag)
        }
    }
}

impl From<BitStreamType> for String {
    fn from(tag: BitStreamType) -> Self {
        tag.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BitStream {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub bitstream_type: BitStreamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Metadata>,
}

impl BitStream {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, bitstream_type: BitStreamType) -> Self {
        self.bitstream_type = bitstream_type;
        self
    }

    pub fn with_technical(mut self, technical: Option<Metadata>) -> Self {
        self.technical = technical;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct File {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    /// External location, or the store's own URL when read back
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Metadata>,
    #[serde(default)]
    pub bitstreams: Vec<BitStream>,
}

impl File {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Default::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn with_technical(mut self, technical: Option<Metadata>) -> Self {
        self.technical = technical;
        self
    }

    pub fn with_bitstream(mut self, bitstream: BitStream) -> Self {
        self.bitstreams.push(bitstream);
        self
    }

    pub fn bitstream(&self, bitstream_id: &str) -> Option<&BitStream> {
        self.bitstreams
            .iter()
            .find(|b| b.identifier.as_deref() == Some(bitstream_id))
    }

    /// Replace the bitstream with `bitstream_id`, keeping its position
    pub fn splice_bitstream(mut self, bitstream_id: &str, mut bitstream: BitStream) -> Result<Self> {
        let slot = self
            .bitstreams
            .iter_mut()
            .find(|b| b.identifier.as_deref() == Some(bitstream_id))
            .ok_or_else(|| StorageError::not_found(format!("bitstream {}", bitstream_id)))?;
        bitstream.identifier = Some(bitstream_id.to_string());
        *slot = bitstream;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Representation {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<Metadata>,
    #[serde(default)]
    pub files: Vec<File>,
}

impl Representation {
    /// Slots a representation carries
    pub const SLOTS: [MetadataSlot; 4] = [
        MetadataSlot::Technical,
        MetadataSlot::Source,
        MetadataSlot::Provenance,
        MetadataSlot::Rights,
    ];

    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_file(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    pub fn metadata(&self, slot: MetadataSlot) -> Option<&Metadata> {
        match slot {
            MetadataSlot::Technical => self.technical.as_ref(),
            MetadataSlot::Source => self.source.as_ref(),
            MetadataSlot::Provenance => self.provenance.as_ref(),
            MetadataSlot::Rights => self.rights.as_ref(),
            MetadataSlot::Descriptive => None,
        }
    }

    pub fn with_metadata(mut self, slot: MetadataSlot, payload: Option<Metadata>) -> Result<Self> {
        match slot {
            MetadataSlot::Technical => self.technical = payload,
            MetadataSlot::Source => self.source = payload,
            MetadataSlot::Provenance => self.provenance = payload,
            MetadataSlot::Rights => self.rights = payload,
            MetadataSlot::Descriptive => {
                return Err(StorageError::unsupported_metadata_path(format!(
                    "representation/{}",
                    slot
                )))
            }
        }
        Ok(self)
    }

    pub fn file(&self, file_id: &str) -> Option<&File> {
        self.files
            .iter()
            .find(|f| f.identifier.as_deref() == Some(file_id))
    }

    /// Replace the file with `file_id`, keeping its position
    pub fn splice_file(mut self, file_id: &str, mut file: File) -> Result<Self> {
        let slot = self
            .files
            .iter_mut()
            .find(|f| f.identifier.as_deref() == Some(file_id))
            .ok_or_else(|| StorageError::not_found(format!("file {}", file_id)))?;
        file.identifier = Some(file_id.to_string());
        *slot = file;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntellectualEntity {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptive: Option<Metadata>,
    #[serde(default)]
    pub representations: Vec<Representation>,
    /// Read-only; derived from the entity node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleState>,
    /// Read-only; number of the version this value was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl IntellectualEntity {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_descriptive(mut self, descriptive: Option<Metadata>) -> Self {
        self.descriptive = descriptive;
        self
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representations.push(representation);
        self
    }

    /// Identifier when present and not blank
    pub fn explicit_identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn representation(&self, rep_id: &str) -> Option<&Representation> {
        self.representations
            .iter()
            .find(|r| r.identifier.as_deref() == Some(rep_id))
    }

    /// Replace the representation with `rep_id`, keeping its position
    pub fn splice_representation(mut self, rep_id: &str, mut representation: Representation) -> Result<Self> {
        let slot = self
            .representations
            .iter_mut()
            .find(|r| r.identifier.as_deref() == Some(rep_id))
            .ok_or_else(|| StorageError::not_found(format!("representation {}", rep_id)))?;
        representation.identifier = Some(rep_id.to_string());
        *slot = representation;
        Ok(self)
    }

    pub fn splice_file(self, rep_id: &str, file_id: &str, file: File) -> Result<Self> {
        let representation = self.existing_representation(rep_id)?.splice_file(file_id, file)?;
        self.splice_representation(rep_id, representation)
    }

    pub fn splice_bitstream(
        self,
        rep_id: &str,
        file_id: &str,
        bitstream_id: &str,
        bitstream: BitStream,
    ) -> Result<Self> {
        let representation = self.existing_representation(rep_id)?;
        let file = representation
            .file(file_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("file {}", file_id)))?
            .splice_bitstream(bitstream_id, bitstream)?;
        let representation = representation.splice_file(file_id, file)?;
        self.splice_representation(rep_id, representation)
    }

    fn existing_representation(&self, rep_id: &str) -> Result<Representation> {
        self.representation(rep_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("representation {}", rep_id)))
    }

    /// Drop read-only state before the value is written as a new version
    pub fn into_content(mut self) -> Self {
        self.lifecycle = None;
        self.version = None;
        self
    }
}

/// Ordered version URIs of one entity, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionList {
    pub entity_id: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityCollection {
    pub entities: Vec<IntellectualEntity>,
}

/// Stored binary of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryContent {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 recorded at ingest
    pub checksum: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> IntellectualEntity {
        IntellectualEntity::new("e1").with_representation(
            Representation::new("r1")
                .with_file(
                    File::new("f1")
                        .with_bitstream(BitStream::new("b1"))
                        .with_bitstream(BitStream::new("b2")),
                )
                .with_file(File::new("f2")),
        )
    }

    #[test]
    fn test_splice_file_keeps_position_and_siblings() {
        let replacement = File::new("ignored").with_filename("new.tif");
        let updated = sample().splice_file("r1", "f1", replacement).unwrap();

        let rep = updated.representation("r1").unwrap();
        assert_eq!(rep.files.len(), 2);
        assert_eq!(rep.files[0].identifier.as_deref(), Some("f1"));
        assert_eq!(rep.files[0].filename.as_deref(), Some("new.tif"));
        assert_eq!(rep.files[1], File::new("f2"));
    }

    #[test]
    fn test_splice_bitstream_touches_only_target() {
        let technical = Metadata::TextMd(json!({"encoding": "utf-8"}));
        let original = sample();
        let updated = original
            .clone()
            .splice_bitstream(
                "r1",
                "f1",
                "b2",
                BitStream::new("b2").with_technical(Some(technical.clone())),
            )
            .unwrap();

        let mut expected = original;
        expected.representations[0].files[0].bitstreams[1].technical = Some(technical);
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_splice_missing_element_is_not_found() {
        let err = sample()
            .splice_representation("nope", Representation::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = sample()
            .splice_bitstream("r1", "f2", "b1", BitStream::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_representation_rejects_descriptive_slot() {
        let err = Representation::new("r1")
            .with_metadata(MetadataSlot::Descriptive, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedMetadataPath);
    }

    #[test]
    fn test_explicit_identifier_ignores_blank() {
        assert_eq!(IntellectualEntity::default().explicit_identifier(), None);
        assert_eq!(
            IntellectualEntity::new("   ").explicit_identifier(),
            None
        );
        assert_eq!(IntellectualEntity::new("e1").explicit_identifier(), Some("e1"));
    }

    #[test]
    fn test_bitstream_type_serde() {
        let bs = BitStream::new("b1").with_type(BitStreamType::Other("CONTAINER".into()));
        let value = serde_json::to_value(&bs).unwrap();
        assert_eq!(value["bitstream_type"], json!("CONTAINER"));

        let parsed: BitStream = serde_json::from_value(json!({"identifier": "b2"})).unwrap();
        assert_eq!(parsed.bitstream_type, BitStreamType::Stream);
    }

    #[test]
    fn test_lifecycle_status_parse() {
        assert_eq!(
            "INGEST_FAILED".parse::<LifecycleStatus>().unwrap(),
            LifecycleStatus::IngestFailed
        );
        assert_eq!(
            "DONE".parse::<LifecycleStatus>().unwrap_err().kind,
            ErrorKind::CorruptState
        );
    }
}
