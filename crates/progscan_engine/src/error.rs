use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`crate::SessionPool`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No session became available before the acquire deadline. Transient;
    /// callers retry with bounded backoff.
    #[error("no session became available within {waited:?}")]
    Exhausted { waited: Duration },
    /// Session creation failed repeatedly. Systemic (browser binary missing,
    /// webdriver endpoint down); fatal for the run.
    #[error("session creation failed {attempts} consecutive times: {last}")]
    Unavailable { attempts: u32, last: String },
}

/// Errors produced by a single browser session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("element not found: {0}")]
    ElementMissing(String),
    #[error("webdriver failure: {0}")]
    WebDriver(String),
}

/// Classified per-task extraction failures. These never propagate beyond
/// the harvester iteration that produced them.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Target content did not render within the per-operation timeout.
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),
    /// A required field (title or URL) could not be read.
    #[error("required field missing: {0}")]
    FieldMissing(String),
    /// The underlying session is no longer usable.
    #[error("session crashed: {0}")]
    SessionCrashed(String),
}

impl From<SessionError> for ExtractError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Timeout(waited) => ExtractError::Timeout(waited),
            SessionError::ElementMissing(selector) => ExtractError::FieldMissing(selector),
            SessionError::WebDriver(message) => ExtractError::SessionCrashed(message),
        }
    }
}

/// Run-level failures. Everything else is aggregated into the run report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("session pool failure: {0}")]
    Pool(#[from] PoolError),
    #[error("list scan failed: {0}")]
    ListScan(#[source] ExtractError),
}
