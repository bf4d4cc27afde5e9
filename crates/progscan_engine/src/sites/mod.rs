//! Site-specific extractors and the registry that selects them.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::extract::SiteExtractor;

mod hku;

pub use hku::HkuExtractor;

static REGISTRY: LazyLock<HashMap<&'static str, Arc<dyn SiteExtractor>>> = LazyLock::new(|| {
    let mut sites: HashMap<&'static str, Arc<dyn SiteExtractor>> = HashMap::new();
    sites.insert("hku", Arc::new(HkuExtractor::new()));
    sites
});

/// Look up the extractor for a university key (e.g. `"hku"`).
pub fn extractor_for(key: &str) -> Option<Arc<dyn SiteExtractor>> {
    REGISTRY.get(key).map(Arc::clone)
}

/// All registered university keys, sorted for stable display.
pub fn registered_keys() -> Vec<&'static str> {
    let mut keys: Vec<_> = REGISTRY.keys().copied().collect();
    keys.sort_unstable();
    keys
}
