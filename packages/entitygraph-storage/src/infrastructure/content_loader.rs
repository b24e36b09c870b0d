//! Local content loader for `file:` URIs

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::ContentLoader;
use crate::error::{Result, StorageError};

/// Reads file bytes from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFileLoader;

impl LocalFileLoader {
    pub fn new() -> Self {
        Self
    }

    /// Filesystem path for a `file:` URI (`file:/a/b`, `file:///a/b`, `file:rel/path`)
    pub fn local_path(uri: &str) -> Result<PathBuf> {
        let rest = uri.strip_prefix("file:").ok_or_else(|| {
            StorageError::unsupported_operation(format!("Cannot load content from {}", uri))
        })?;
        let rest = match rest.strip_prefix("//") {
            Some(authority_and_path) => {
                let slash = authority_and_path.find('/').unwrap_or(authority_and_path.len());
                &authority_and_path[slash..]
            }
            None => rest,
        };
        let decoded = urlencoding::decode(rest)
            .map_err(|e| StorageError::backend(format!("Malformed file URI {}: {}", uri, e)))?;
        Ok(PathBuf::from(decoded.into_owned()))
    }
}

#[async_trait]
impl ContentLoader for LocalFileLoader {
    async fn load(&self, uri: &str) -> Result<Vec<u8>> {
        let path = Self::local_path(uri)?;
        debug!(uri, path = %path.display(), "Loading file content");
        Ok(tokio::fs::read(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_local_path_forms() {
        assert_eq!(
            LocalFileLoader::local_path("file:///tmp/a%20b.txt").unwrap(),
            PathBuf::from("/tmp/a b.txt")
        );
        assert_eq!(
            LocalFileLoader::local_path("file:/tmp/x").unwrap(),
            PathBuf::from("/tmp/x")
        );
        assert_eq!(
            LocalFileLoader::local_path("file:data/x.bin").unwrap(),
            PathBuf::from("data/x.bin")
        );
    }

    #[tokio::test]
    async fn test_load_reads_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        let uri = format!("file:{}", tmp.path().display());

        let bytes = LocalFileLoader::new().load(&uri).await.unwrap();
        assert_eq!(bytes, b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_other_schemes_unsupported() {
        let err = LocalFileLoader::new()
            .load("http://example.org/a.tif")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }
}
