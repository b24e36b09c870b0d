//! Store configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";

/// Deployment settings consumed by the entity store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// File bytes stay at their external URI instead of being copied in
    pub referenced_content: bool,
    /// Base URL clients use to fetch stored binaries
    pub public_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            referenced_content: false,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn referenced() -> Self {
        Self {
            referenced_content: true,
            ..Self::default()
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    /// Public URL of a stored file binary
    pub fn file_url(&self, entity_id: &str, rep_id: &str, file_id: &str, version: u32) -> String {
        format!(
            "{}/file/{}/{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            entity_id,
            rep_id,
            file_id,
            version
        )
    }

    /// Inverse of [`StoreConfig::file_url`] for URLs under this store's base
    pub fn parse_file_url(&self, uri: &str) -> Option<StoredFileRef> {
        let base = self.public_base_url.trim_end_matches('/');
        let rest = uri.strip_prefix(base)?.strip_prefix("/file/")?;
        let mut parts = rest.split('/');
        let (entity_id, rep_id, file_id, version) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || [entity_id, rep_id, file_id].iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(StoredFileRef {
            entity_id: entity_id.to_string(),
            rep_id: rep_id.to_string(),
            file_id: file_id.to_string(),
            version: version.parse().ok().filter(|n| *n >= 1)?,
        })
    }
}

/// File binary already held by the store, addressed by its public URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFileRef {
    pub entity_id: String,
    pub rep_id: String,
    pub file_id: String,
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_trims_trailing_slash() {
        let config = StoreConfig::default().with_public_base_url("https://archive.example/");
        assert_eq!(
            config.file_url("e1", "r1", "f1", 3),
            "https://archive.example/file/e1/r1/f1/3"
        );
    }

    #[test]
    fn test_parse_file_url_round_trip() {
        let config = StoreConfig::default();
        let url = config.file_url("e1", "r1", "f1", 2);
        assert_eq!(
            config.parse_file_url(&url),
            Some(StoredFileRef {
                entity_id: "e1".into(),
                rep_id: "r1".into(),
                file_id: "f1".into(),
                version: 2,
            })
        );
        assert_eq!(config.parse_file_url("file:/tmp/scan.tif"), None);
        assert_eq!(config.parse_file_url("http://localhost:8080/file/e1/r1/f1/0"), None);
        assert_eq!(config.parse_file_url("http://localhost:8080/file/e1/r1/f1/2/x"), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"referenced_content": true}"#).unwrap();
        assert!(config.referenced_content);
        assert_eq!(config.public_base_url, DEFAULT_PUBLIC_BASE_URL);
    }
}
