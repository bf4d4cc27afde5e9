use serde::{Deserialize, Serialize};

/// How a harvester reaches the detail content for one discovered program.
///
/// A locator is opaque to the pool and queue; only the site extractor that
/// produced it knows how to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// A plain detail-page URL.
    Url(String),
    /// A hash-route on a list page; the fragment selects the detail view.
    HashRoute { page_url: String, fragment: String },
    /// A click target on a list page that reveals the detail content,
    /// typically via a popup or expansion panel.
    ClickTarget { page_url: String, element_id: String },
}

impl Locator {
    /// The page the session must navigate to before resolving this locator.
    pub fn navigation_url(&self) -> String {
        match self {
            Locator::Url(url) => url.clone(),
            Locator::HashRoute { page_url, fragment } => format!("{page_url}#{fragment}"),
            Locator::ClickTarget { page_url, .. } => page_url.clone(),
        }
    }
}

/// One unit of work discovered from a list page. Immutable once created;
/// consumed exactly once by a harvester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTask {
    pub locator: Locator,
    /// Display title, when the list page already showed one.
    pub title: Option<String>,
    /// The list page this task was discovered on.
    pub source_page: String,
}

/// The output of one successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub university_code: String,
    pub program_name: String,
    /// Canonical detail-page URL.
    pub detail_url: String,
    pub apply_link: Option<String>,
    pub deadline: Option<String>,
    pub open_date: Option<String>,
    /// Faculty or study area, when the site groups programs by one.
    pub faculty: Option<String>,
}
