//! Content-addressed fingerprints for uploaded document sets.
//!
//! Processing is expensive (every chunk costs an embedding call), so a run is
//! skipped when the persisted index was built from exactly the same uploads.
//! "Exactly the same" is a SHA-256 over every document's name and bytes in
//! upload order. The digest is stored in the index manifest together with the
//! embedding model and chunk settings ([`crate::index::IndexKey`]) and
//! compared on the next run. Any change to the set (a new file, a removed
//! file, edited bytes, a rename, a different order) produces a different
//! fingerprint and forces a full rebuild.

use crate::pipeline::input::Document;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest identifying a document set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an ordered document set.
    ///
    /// Each document contributes its name length, name, byte length and bytes,
    /// so `("ab", "c")` and `("a", "bc")` cannot collide by concatenation.
    pub fn of_documents(documents: &[Document]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((documents.len() as u64).to_le_bytes());
        for doc in documents {
            hasher.update((doc.name.len() as u64).to_le_bytes());
            hasher.update(doc.name.as_bytes());
            hasher.update((doc.bytes.len() as u64).to_le_bytes());
            hasher.update(&doc.bytes);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Rebuild a fingerprint read back from the index manifest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
