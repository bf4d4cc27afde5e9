use std::time::Duration;

use crate::error::SessionError;

/// Whether the browser runs with a visible window. Some sites sit behind
/// WAFs that block headless browsers, so visibility is configured per
/// university rather than globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Headless,
    Headful,
}

/// Health of a pooled session. Transitions are forward-only:
/// `Healthy -> Degraded -> Dead`. A dead session never rejoins the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Health {
    Healthy,
    Degraded,
    Dead,
}

/// Element selector understood by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Css(String),
    XPath(String),
}

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Target::XPath(expr.into())
    }
}

/// One live browser automation handle: navigation, waits, reads, clicks.
///
/// Every waiting operation takes an explicit timeout; nothing here blocks
/// unboundedly. Implementations must be usable from a single harvester at a
/// time; exclusivity is enforced by the pool, not by the session.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), SessionError>;

    /// Wait until `target` is present in the DOM, up to `timeout`.
    async fn wait_for(&self, target: &Target, timeout: Duration) -> Result<(), SessionError>;

    /// Trimmed text content of the first element matching `target`.
    async fn text_of(&self, target: &Target) -> Result<String, SessionError>;

    /// Attribute value of the first element matching `target`.
    async fn attr_of(&self, target: &Target, attr: &str)
        -> Result<Option<String>, SessionError>;

    async fn click(&self, target: &Target) -> Result<(), SessionError>;

    /// Full HTML source of the current page, for offline parsing.
    async fn page_source(&self) -> Result<String, SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    /// Click `target` and wait up to `timeout` for a new window to open.
    /// On success the session is left focused on the new window and its URL
    /// is returned; `None` means the click opened nothing. The pool's reset
    /// on release closes stray windows.
    async fn click_through(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Option<String>, SessionError>;

    /// Restore the session to a lendable state: close extra windows, return
    /// to the main window, clear cookies.
    async fn reset(&self) -> Result<(), SessionError>;

    /// Tear down the native browser process.
    async fn quit(&self) -> Result<(), SessionError>;
}

/// Creates sessions for the pool. The webdriver-backed implementation lives
/// in [`crate::webdriver`]; tests substitute fakes.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, visibility: Visibility)
        -> Result<Box<dyn BrowserSession>, SessionError>;
}
