//! WebDriver-backed [`BrowserSession`] over a chromedriver endpoint.

use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use thirtyfour::WindowHandle;

use crate::error::SessionError;
use crate::session::{BrowserSession, SessionFactory, Target, Visibility};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Connection settings for the chromedriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    pub server_url: String,
    pub page_load_timeout: Duration,
    pub window_size: (u32, u32),
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:9515".to_string(),
            page_load_timeout: Duration::from_secs(30),
            window_size: (1920, 1080),
        }
    }
}

/// Spawns Chrome sessions through the configured chromedriver.
pub struct WebDriverFactory {
    settings: WebDriverSettings,
}

impl WebDriverFactory {
    pub fn new(settings: WebDriverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SessionFactory for WebDriverFactory {
    async fn create(
        &self,
        visibility: Visibility,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        let window_size = format!(
            "--window-size={},{}",
            self.settings.window_size.0, self.settings.window_size.1
        );
        let mut args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-blink-features=AutomationControlled",
            window_size.as_str(),
        ];
        if visibility == Visibility::Headless {
            args.push("--headless=new");
        }

        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_option("args", args).map_err(wire_error)?;

        let driver = WebDriver::new(&self.settings.server_url, caps)
            .await
            .map_err(wire_error)?;
        driver
            .set_page_load_timeout(self.settings.page_load_timeout)
            .await
            .map_err(wire_error)?;
        let main_window = driver.window().await.map_err(wire_error)?;
        engine_debug!("created {visibility:?} chrome session");

        Ok(Box::new(WebDriverSession {
            driver,
            main_window,
        }))
    }
}

/// One live Chrome session plus the handle of its original window, kept so
/// `reset` can always find its way back after multi-window detours.
pub struct WebDriverSession {
    driver: WebDriver,
    main_window: WindowHandle,
}

fn locator(target: &Target) -> By {
    match target {
        Target::Css(selector) => By::Css(selector),
        Target::XPath(expr) => By::XPath(expr),
    }
}

fn wire_error(err: WebDriverError) -> SessionError {
    match err {
        WebDriverError::NoSuchElement(info) => SessionError::ElementMissing(format!("{info:?}")),
        other => SessionError::WebDriver(other.to_string()),
    }
}

impl WebDriverSession {
    async fn find(&self, target: &Target) -> Result<WebElement, SessionError> {
        match self.driver.query(locator(target)).nowait().first().await {
            Ok(element) => Ok(element),
            Err(WebDriverError::NoSuchElement(_)) => match target {
                Target::Css(selector) => Err(SessionError::ElementMissing(selector.clone())),
                Target::XPath(expr) => Err(SessionError::ElementMissing(expr.clone())),
            },
            Err(other) => Err(wire_error(other)),
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.driver.goto(url).await.map_err(wire_error)
    }

    async fn wait_for(&self, target: &Target, timeout: Duration) -> Result<(), SessionError> {
        let present = self
            .driver
            .query(locator(target))
            .wait(timeout, POLL_INTERVAL)
            .exists()
            .await
            .map_err(wire_error)?;
        if present {
            Ok(())
        } else {
            Err(SessionError::Timeout(timeout))
        }
    }

    async fn text_of(&self, target: &Target) -> Result<String, SessionError> {
        let element = self.find(target).await?;
        let text = element.text().await.map_err(wire_error)?;
        Ok(text.trim().to_string())
    }

    async fn attr_of(
        &self,
        target: &Target,
        attr: &str,
    ) -> Result<Option<String>, SessionError> {
        let element = self.find(target).await?;
        element.attr(attr).await.map_err(wire_error)
    }

    async fn click(&self, target: &Target) -> Result<(), SessionError> {
        let element = self.find(target).await?;
        // Chrome refuses clicks on off-screen elements.
        element.scroll_into_view().await.map_err(wire_error)?;
        element.click().await.map_err(wire_error)
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        self.driver.source().await.map_err(wire_error)
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let url = self.driver.current_url().await.map_err(wire_error)?;
        Ok(url.to_string())
    }

    async fn click_through(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Option<String>, SessionError> {
        let before = self.driver.windows().await.map_err(wire_error)?;
        self.click(target).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let handles = self.driver.windows().await.map_err(wire_error)?;
            if let Some(new_window) = handles.iter().find(|h| !before.contains(h)) {
                self.driver
                    .switch_to_window(new_window.clone())
                    .await
                    .map_err(wire_error)?;
                let url = self.driver.current_url().await.map_err(wire_error)?;
                return Ok(Some(url.to_string()));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn reset(&self) -> Result<(), SessionError> {
        let handles = self.driver.windows().await.map_err(wire_error)?;
        for handle in handles {
            if handle != self.main_window {
                self.driver
                    .switch_to_window(handle)
                    .await
                    .map_err(wire_error)?;
                self.driver.close_window().await.map_err(wire_error)?;
            }
        }
        self.driver
            .switch_to_window(self.main_window.clone())
            .await
            .map_err(wire_error)?;
        self.driver.delete_all_cookies().await.map_err(wire_error)
    }

    async fn quit(&self) -> Result<(), SessionError> {
        if let Err(err) = self.driver.clone().quit().await {
            engine_warn!("chrome session did not quit cleanly: {err}");
            return Err(wire_error(err));
        }
        Ok(())
    }
}
