//! Shared test doubles for the pool and coordinator tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use progscan_core::{DiscoveryTask, Locator, RawRecord};
use progscan_engine::{
    BrowserSession, ExtractError, SessionError, SessionFactory, SiteExtractor, Target, Visibility,
};

/// In-memory stand-in for a browser session. `alive` is shared with the
/// factory so tests can assert that every created session was quit.
pub struct FakeSession {
    alive: Arc<AtomicUsize>,
    quit_called: AtomicBool,
    resets: AtomicUsize,
    fail_reset: bool,
}

impl FakeSession {
    fn new(alive: Arc<AtomicUsize>, fail_reset: bool) -> Self {
        alive.fetch_add(1, Ordering::SeqCst);
        Self {
            alive,
            quit_called: AtomicBool::new(false),
            resets: AtomicUsize::new(0),
            fail_reset,
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&self, _url: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn wait_for(&self, _target: &Target, _timeout: Duration) -> Result<(), SessionError> {
        Ok(())
    }

    async fn text_of(&self, _target: &Target) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn attr_of(
        &self,
        _target: &Target,
        _attr: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(None)
    }

    async fn click(&self, _target: &Target) -> Result<(), SessionError> {
        Ok(())
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        Ok(String::new())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok("about:blank".to_string())
    }

    async fn click_through(
        &self,
        _target: &Target,
        _timeout: Duration,
    ) -> Result<Option<String>, SessionError> {
        Ok(None)
    }

    async fn reset(&self) -> Result<(), SessionError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            Err(SessionError::WebDriver("reset rejected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn quit(&self) -> Result<(), SessionError> {
        if !self.quit_called.swap(true, Ordering::SeqCst) {
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Factory with a scriptable failure budget. The first `failures_remaining`
/// create calls fail; afterwards every call succeeds.
pub struct FakeFactory {
    pub alive: Arc<AtomicUsize>,
    created: AtomicUsize,
    failures_remaining: AtomicUsize,
    fail_reset: bool,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: usize) -> Self {
        Self {
            alive: Arc::new(AtomicUsize::new(0)),
            created: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(failures),
            fail_reset: false,
        }
    }

    pub fn with_failing_reset() -> Self {
        Self {
            fail_reset: true,
            ..Self::new()
        }
    }

    /// Sessions created so far, including ones since quit.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Sessions created and not yet quit.
    pub fn alive(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionFactory for FakeFactory {
    async fn create(
        &self,
        _visibility: Visibility,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(SessionError::WebDriver(
                "chromedriver refused the session".to_string(),
            ));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession::new(
            Arc::clone(&self.alive),
            self.fail_reset,
        )))
    }
}

pub fn task(title: &str, url: &str) -> DiscoveryTask {
    DiscoveryTask {
        locator: Locator::Url(url.to_string()),
        title: Some(title.to_string()),
        source_page: "https://u.example/listing".to_string(),
    }
}

/// Extractor whose list scan returns a fixed task set and whose per-task
/// behavior is scripted through the task title: titles starting with
/// `timeout`, `crash` or `missing` fail with the matching error, everything
/// else yields a record named after the title.
pub struct FakeExtractor {
    tasks: Vec<DiscoveryTask>,
    extract_delay: Duration,
}

impl FakeExtractor {
    pub fn new(tasks: Vec<DiscoveryTask>) -> Self {
        Self {
            tasks,
            extract_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(tasks: Vec<DiscoveryTask>, extract_delay: Duration) -> Self {
        Self {
            tasks,
            extract_delay,
        }
    }
}

#[async_trait::async_trait]
impl SiteExtractor for FakeExtractor {
    fn university_code(&self) -> &'static str {
        "TEST1"
    }

    async fn scan_list(
        &self,
        _session: &dyn BrowserSession,
        _list_url: &str,
    ) -> Result<Vec<DiscoveryTask>, ExtractError> {
        Ok(self.tasks.clone())
    }

    async fn extract(
        &self,
        _session: &dyn BrowserSession,
        task: &DiscoveryTask,
    ) -> Result<RawRecord, ExtractError> {
        if !self.extract_delay.is_zero() {
            tokio::time::sleep(self.extract_delay).await;
        }
        let title = task.title.clone().unwrap_or_default();
        if title.starts_with("timeout") {
            return Err(ExtractError::Timeout(Duration::from_millis(10)));
        }
        if title.starts_with("crash") {
            return Err(ExtractError::SessionCrashed("tab gone".to_string()));
        }
        if title.starts_with("missing") {
            return Err(ExtractError::FieldMissing("program name".to_string()));
        }
        Ok(RawRecord {
            university_code: "TEST1".to_string(),
            program_name: title,
            detail_url: task.locator.navigation_url(),
            apply_link: None,
            deadline: None,
            open_date: None,
            faculty: None,
        })
    }
}
