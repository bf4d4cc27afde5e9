//! Progscan engine: concurrent browser-session pooling and harvesting.
//!
//! The pipeline is a [`Coordinator`] that scans a university's program
//! listing into a [`TaskQueue`], then runs harvester workers that pair each
//! task with a session borrowed from the [`SessionPool`], extract one
//! [`progscan_core::RawRecord`] per task, and aggregate everything into a
//! [`RunReport`].

mod coordinator;
mod error;
mod extract;
mod pool;
mod queue;
mod report;
mod session;
pub mod sites;
mod webdriver;
mod worker;

pub use coordinator::{Coordinator, RunSettings};
pub use error::{ExtractError, PoolError, RunError, SessionError};
pub use extract::{release_outcome, SiteExtractor};
pub use pool::{ReleaseOutcome, SessionLease, SessionPool};
pub use queue::TaskQueue;
pub use report::{FailedTask, RunReport};
pub use session::{BrowserSession, Health, SessionFactory, Target, Visibility};
pub use webdriver::{WebDriverFactory, WebDriverSession, WebDriverSettings};
