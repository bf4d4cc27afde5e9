//! Progscan core: program-listing data model and the deduplication gate.
mod dedup;
mod model;
mod normalize;

pub use dedup::{Deduplicator, Fingerprint, Offer};
pub use model::{DiscoveryTask, Locator, RawRecord};
pub use normalize::{clean_text, normalize_for_fingerprint};
