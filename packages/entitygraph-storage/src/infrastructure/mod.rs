//! Infrastructure layer: backend adapters and content loading

pub mod content_loader;
pub mod memory_backend;

#[cfg(feature = "sqlite")]
pub mod search_index;
#[cfg(feature = "sqlite")]
pub mod sqlite_backend;

pub use content_loader::LocalFileLoader;
pub use memory_backend::InMemoryBackend;

#[cfg(feature = "sqlite")]
pub use search_index::FullTextIndex;
#[cfg(feature = "sqlite")]
pub use sqlite_backend::SqliteBackend;

use crate::domain::{Node, NodeType};

/// Searchable text of a structural node: its literals plus the literals and
/// metadata content of everything stored beneath it.
pub(crate) fn searchable_text<'a>(node: &Node, descendants: impl Iterator<Item = &'a Node>) -> String {
    let mut parts: Vec<String> = node.properties.literal_text().map(str::to_string).collect();
    for child in descendants {
        parts.extend(child.properties.literal_text().map(str::to_string));
        if child.has_type(NodeType::Metadata) {
            if let Some(content) = &child.content {
                parts.push(String::from_utf8_lossy(&content.bytes).into_owned());
            }
        }
    }
    parts.join("\n")
}

/// Search tokens of a text: lowercase alphanumeric runs shorter than 40 bytes.
/// Matches the tokenizer of the tantivy `text` field.
pub(crate) fn search_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && token.len() < MAX_TOKEN_BYTES)
        .map(str::to_lowercase)
}

const MAX_TOKEN_BYTES: usize = 40;

/// Apply offset/limit where 0 means unbounded
pub(crate) fn paginate<T>(items: impl Iterator<Item = T>, offset: usize, limit: usize) -> Vec<T> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    items.skip(offset).take(limit).collect()
}
