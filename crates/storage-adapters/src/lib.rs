//! # storage-adapters
//!
//! Implementations of the `DocumentStore` and `MediaStorage` ports.
//!
//! | Adapter                | Feature       |
//! |------------------------|---------------|
//! | `MemoryDocumentStore`  | always        |
//! | `MemoryMediaStorage`   | always        |
//! | `SqliteDocumentStore`  | `db-sqlite`   |
//! | `LocalMediaStorage`    | `media-local` |

mod ops;

pub mod memory;
#[cfg(feature = "media-local")]
pub mod media_local;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use memory::{MemoryDocumentStore, MemoryMediaStorage};
#[cfg(feature = "media-local")]
pub use media_local::LocalMediaStorage;
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteDocumentStore;

use domains::{DomainError, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Makes an owner id safe to use as a single path segment.
pub(crate) fn sanitize_segment(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains("..") {
        return Err(DomainError::Validation(format!("invalid storage owner {raw:?}")));
    }
    Ok(trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect())
}

/// Fresh key under the owner's prefix: `owner/<uuid v7>-<sha256[..12]>.<ext>`.
/// Every upload gets its own key, even for identical bytes, so deleting one
/// object never takes out a file another record points at.
pub(crate) fn object_key(owner: &str, file_name: &str, content_type: &str, data: &[u8]) -> String {
    let hash = hex::encode(Sha256::digest(data));
    let stem = format!("{}-{}", Uuid::now_v7().simple(), &hash[..12]);
    match extension(file_name, content_type) {
        Some(ext) => format!("{owner}/{stem}.{ext}"),
        None => format!("{owner}/{stem}"),
    }
}

fn extension(file_name: &str, content_type: &str) -> Option<String> {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    from_name.or_else(|| {
        let mime: mime::Mime = content_type.parse().ok()?;
        mime_guess::get_mime_extensions(&mime)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_replaces_unsafe_characters() {
        assert_eq!(sanitize_segment("auth0|123").unwrap(), "auth0_123");
        assert!(sanitize_segment("  ").is_err());
        assert!(sanitize_segment("a/../b").is_err());
    }

    #[test]
    fn key_extension_prefers_file_name() {
        let key = object_key("u1", "Certificate.PDF", "image/png", b"abc");
        assert!(key.starts_with("u1/"));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn key_extension_falls_back_to_content_type() {
        let key = object_key("u1", "upload", "image/png", b"abc");
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn identical_bytes_get_distinct_keys() {
        let first = object_key("u1", "a.pdf", "", b"same");
        let second = object_key("u1", "a.pdf", "", b"same");
        assert_ne!(first, second);
        // hash suffix still identifies the content
        let suffix = |k: &str| k.rsplit_once('-').map(|(_, s)| s.to_string());
        assert_eq!(suffix(&first), suffix(&second));
    }
}
