//! Git blob-format content hashing.
//!
//! `sha1("blob " + byte_len + "\0" + content)`, hex encoded. The same value
//! `git hash-object` prints, so a manifest can be checked with stock tools.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Hex-encoded git blob SHA-1 of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash `content` the way git hashes a blob.
    pub fn of(content: &str) -> Self {
        Self::of_bytes(content.as_bytes())
    }

    pub fn of_bytes(content: &[u8]) -> Self {
        let mut h = Sha1::new();
        h.update(format!("blob {}\0", content.len()).as_bytes());
        h.update(content);
        Self(hex::encode(h.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines and tables.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_matches_git() {
        assert_eq!(
            ContentHash::of("").as_str(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn test_blob_matches_git() {
        assert_eq!(
            ContentHash::of("test").as_str(),
            "30d74d258442c7c65512eafab474568dd706c430"
        );
    }

    #[test]
    fn length_prefix_uses_bytes_not_chars() {
        // "é" is two bytes; a char-count prefix would give a different digest.
        let by_str = ContentHash::of("é");
        let by_bytes = ContentHash::of_bytes("é".as_bytes());
        assert_eq!(by_str, by_bytes);
        assert_ne!(by_str, ContentHash::of("e"));
    }

    #[test]
    fn short_is_eight_chars() {
        assert_eq!(ContentHash::of("test").short(), "30d74d25");
    }
}
