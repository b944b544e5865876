//! Fingerprint Store
//!
//! In-memory record of every transfer this process has already reported.
//!
//! The store only grows: fingerprints are never evicted and nothing is
//! persisted, so a long-running watcher holds one entry per distinct transfer
//! it has ever seen. At one page of a few events per poll this stays small,
//! but it is unbounded.

use std::collections::HashSet;
use std::fmt;

use crate::event::TransferEvent;

/// Deduplication key for a transfer event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The event hash, or its canonical content when the hash is missing
    pub fn of(event: &TransferEvent) -> Self {
        match &event.hash {
            Some(hash) => Fingerprint(hash.clone()),
            None => Fingerprint(event.content_key().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Fingerprint(value.to_string())
    }
}

/// Set of fingerprints observed during this process lifetime
#[derive(Debug, Default)]
pub struct FingerprintStore {
    seen: HashSet<Fingerprint>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a fingerprint
    ///
    /// # Returns
    /// `true` if the fingerprint was new, `false` if it had already been seen
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.seen.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
