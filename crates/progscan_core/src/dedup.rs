use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::RawRecord;
use crate::normalize::normalize_for_fingerprint;

/// Derived identity key for a record: normalized title and URL joined by a
/// separator. Never persisted; always recomputed from a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_parts(title: &str, url: &str) -> Self {
        Self(format!(
            "{}|{}",
            normalize_for_fingerprint(title),
            normalize_for_fingerprint(url)
        ))
    }

    pub fn of(record: &RawRecord) -> Self {
        Self::from_parts(&record.program_name, &record.detail_url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Verdict of the deduplication gate for one offered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Duplicate,
}

/// Stream gate ensuring at most one record per fingerprint passes through.
///
/// The seen-set grows monotonically for the lifetime of one run. Offers from
/// concurrent harvesters race on a single critical section; exactly one of
/// two simultaneous duplicates wins.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashMap<Fingerprint, RawRecord>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `record` if its fingerprint has not been seen this run.
    pub fn offer(&self, record: &RawRecord) -> Offer {
        let fingerprint = Fingerprint::of(record);
        let mut seen = self.seen.lock().expect("dedup mutex poisoned");
        if seen.contains_key(&fingerprint) {
            Offer::Duplicate
        } else {
            seen.insert(fingerprint, record.clone());
            Offer::Accepted
        }
    }

    /// Number of distinct fingerprints accepted so far.
    pub fn accepted_len(&self) -> usize {
        self.seen.lock().expect("dedup mutex poisoned").len()
    }
}
