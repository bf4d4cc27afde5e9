use progscan_core::{DiscoveryTask, RawRecord};

use crate::error::ExtractError;
use crate::pool::ReleaseOutcome;
use crate::session::BrowserSession;

/// Site-specific scraping capability, one implementation per university.
///
/// Implementations receive a session already owned exclusively by the
/// calling harvester; they never keep a reference past the call.
#[async_trait::async_trait]
pub trait SiteExtractor: Send + Sync {
    /// University code stamped onto produced records (e.g. `"HK001"`).
    fn university_code(&self) -> &'static str;

    /// Scan the list page(s) at `list_url` and return one task per
    /// discovered program, in discovery order.
    async fn scan_list(
        &self,
        session: &dyn BrowserSession,
        list_url: &str,
    ) -> Result<Vec<DiscoveryTask>, ExtractError>;

    /// Resolve `task`'s locator with `session` and read the record fields.
    /// Optional fields may come back empty; title and URL are required.
    async fn extract(
        &self,
        session: &dyn BrowserSession,
        task: &DiscoveryTask,
    ) -> Result<RawRecord, ExtractError>;
}

/// Map a per-task failure to the health outcome reported on release.
///
/// A timeout is flaky rather than fatal: the pool degrades the session only
/// when timeouts recur. A missing field says nothing about session health.
pub fn release_outcome(err: &ExtractError) -> ReleaseOutcome {
    match err {
        ExtractError::Timeout(_) => ReleaseOutcome::Flaky,
        ExtractError::FieldMissing(_) => ReleaseOutcome::Ok,
        ExtractError::SessionCrashed(_) => ReleaseOutcome::Dead,
    }
}
