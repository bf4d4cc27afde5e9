//! University of Hong Kong taught-postgraduate listing.
//!
//! The listing is a paginated table of `programme-details` anchors. Detail
//! pages label their fields ("Start Date", "Deadline") with the value in the
//! following sibling element, and the online-application URL sits behind a
//! two-step chain of windows opened by "Apply Now".

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use progscan_core::{clean_text, DiscoveryTask, Locator, RawRecord};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{ExtractError, SessionError};
use crate::extract::SiteExtractor;
use crate::session::{BrowserSession, Target};

const UNIVERSITY_CODE: &str = "HK001";

const LIST_PAGE_WAIT: Duration = Duration::from_secs(20);
const DETAIL_PAGE_WAIT: Duration = Duration::from_secs(10);
const NEW_WINDOW_WAIT: Duration = Duration::from_secs(5);
const PAGE_FLIP_SETTLE: Duration = Duration::from_millis(800);

const PROGRAM_LINK_CSS: &str = r#"a[href*="programme-details"]"#;
const NEXT_PAGE_XPATH: &str = "//a[contains(text(), '\u{bb}')]";

static PROGRAM_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(PROGRAM_LINK_CSS).expect("static selector"));

pub struct HkuExtractor;

impl HkuExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HkuExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SiteExtractor for HkuExtractor {
    fn university_code(&self) -> &'static str {
        UNIVERSITY_CODE
    }

    async fn scan_list(
        &self,
        session: &dyn BrowserSession,
        list_url: &str,
    ) -> Result<Vec<DiscoveryTask>, ExtractError> {
        let base = Url::parse(list_url)
            .map_err(|err| ExtractError::FieldMissing(format!("list url: {err}")))?;

        session.goto(list_url).await?;
        session
            .wait_for(&Target::css(PROGRAM_LINK_CSS), LIST_PAGE_WAIT)
            .await?;

        let mut tasks = Vec::new();
        let mut seen_links = HashSet::new();
        let mut page_num = 1usize;
        loop {
            let html = session.page_source().await?;
            let found = collect_program_links(&html, &base, &mut seen_links, &mut tasks);
            engine_debug!("hku list page {page_num}: {found} new programs");

            // A page that adds nothing means the pagination control lied
            // about having more content; stop before clicking it again.
            if found == 0 {
                break;
            }
            if !self.flip_to_next_page(session).await? {
                break;
            }
            page_num += 1;
        }

        engine_info!("hku list scan found {} programs over {page_num} pages", tasks.len());
        Ok(tasks)
    }

    async fn extract(
        &self,
        session: &dyn BrowserSession,
        task: &DiscoveryTask,
    ) -> Result<RawRecord, ExtractError> {
        let detail_url = resolve_locator(session, &task.locator).await?;
        session
            .wait_for(&label_target("Start Date"), DETAIL_PAGE_WAIT)
            .await?;

        let program_name = match task.title.as_deref().map(clean_text) {
            Some(name) if !name.is_empty() => name,
            _ => optional_text(session, &Target::css("h1"))
                .await?
                .ok_or_else(|| ExtractError::FieldMissing("program name".to_string()))?,
        };

        let open_date = optional_text(session, &sibling_of_label("Start Date")).await?;
        let deadline = optional_raw_text(session, &sibling_of_label("Deadline"))
            .await?
            .map(|text| clean_text(&text.replace('\n', " | ")));
        let faculty = optional_text(session, &sibling_of_label("Faculty")).await?;
        let apply_link = resolve_apply_link(session).await?;

        Ok(RawRecord {
            university_code: UNIVERSITY_CODE.to_string(),
            program_name,
            detail_url,
            apply_link,
            deadline,
            open_date,
            faculty,
        })
    }
}

impl HkuExtractor {
    /// Click the `»` pager link unless its parent is marked disabled.
    /// Returns whether a next page was opened.
    async fn flip_to_next_page(
        &self,
        session: &dyn BrowserSession,
    ) -> Result<bool, ExtractError> {
        let parent = Target::xpath(format!("{NEXT_PAGE_XPATH}/.."));
        let parent_class = match session.attr_of(&parent, "class").await {
            Ok(class) => class.unwrap_or_default(),
            Err(SessionError::ElementMissing(_)) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if parent_class.contains("disabled") {
            return Ok(false);
        }

        match session.click(&Target::xpath(NEXT_PAGE_XPATH)).await {
            Ok(()) => {
                tokio::time::sleep(PAGE_FLIP_SETTLE).await;
                Ok(true)
            }
            Err(SessionError::ElementMissing(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Parse one list page snapshot, appending a task per unseen program link.
/// Returns how many new programs this page contributed.
fn collect_program_links(
    html: &str,
    base: &Url,
    seen_links: &mut HashSet<String>,
    tasks: &mut Vec<DiscoveryTask>,
) -> usize {
    let document = Html::parse_document(html);
    let mut found = 0usize;
    for anchor in document.select(&PROGRAM_LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(link) = base.join(href) else {
            continue;
        };
        let link = link.to_string();

        // The anchor renders degree level on the first line and the program
        // name on the second.
        let lines: Vec<String> = anchor
            .text()
            .map(clean_text)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(name) = lines.get(1).or_else(|| lines.first()) else {
            continue;
        };

        if seen_links.insert(link.clone()) {
            tasks.push(DiscoveryTask {
                locator: Locator::Url(link),
                title: Some(name.clone()),
                source_page: base.to_string(),
            });
            found += 1;
        }
    }
    found
}

/// Navigate the session to the task's detail content and return its
/// canonical URL.
async fn resolve_locator(
    session: &dyn BrowserSession,
    locator: &Locator,
) -> Result<String, ExtractError> {
    match locator {
        Locator::Url(url) => {
            session.goto(url).await?;
            Ok(url.clone())
        }
        Locator::HashRoute { .. } => {
            let url = locator.navigation_url();
            session.goto(&url).await?;
            Ok(url)
        }
        Locator::ClickTarget {
            page_url,
            element_id,
        } => {
            session.goto(page_url).await?;
            session.click(&Target::css(format!("#{element_id}"))).await?;
            Ok(session.current_url().await?)
        }
    }
}

fn label_target(label: &str) -> Target {
    Target::xpath(format!("//*[contains(text(), '{label}')]"))
}

fn sibling_of_label(label: &str) -> Target {
    Target::xpath(format!(
        "//*[contains(text(), '{label}')]/following-sibling::*"
    ))
}

/// Read an optional field. Absence and a render timeout both mean "not
/// published"; only a wire failure is an error.
async fn optional_raw_text(
    session: &dyn BrowserSession,
    target: &Target,
) -> Result<Option<String>, ExtractError> {
    match session.text_of(target).await {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(SessionError::ElementMissing(_)) | Err(SessionError::Timeout(_)) => Ok(None),
        Err(SessionError::WebDriver(message)) => Err(ExtractError::SessionCrashed(message)),
    }
}

async fn optional_text(
    session: &dyn BrowserSession,
    target: &Target,
) -> Result<Option<String>, ExtractError> {
    Ok(optional_raw_text(session, target)
        .await?
        .map(|text| clean_text(&text)))
}

/// Chase the application URL through up to two opened windows:
/// "Apply Now" opens an instructions page whose "Applying" link opens the
/// actual application system. Every fallback keeps the best URL found so
/// far; a missing chain step is not a task failure.
async fn resolve_apply_link(
    session: &dyn BrowserSession,
) -> Result<Option<String>, ExtractError> {
    let apply_button = Target::xpath("//a[contains(text(), 'Apply Now')]");
    let instructions_url = match session.click_through(&apply_button, NEW_WINDOW_WAIT).await {
        Ok(Some(url)) => url,
        // The button navigated in place or did nothing; its href is the
        // best answer available.
        Ok(None) => return read_href(session, &apply_button).await,
        Err(SessionError::ElementMissing(_)) | Err(SessionError::Timeout(_)) => return Ok(None),
        Err(SessionError::WebDriver(message)) => {
            return Err(ExtractError::SessionCrashed(message))
        }
    };

    let applying_link = Target::css("#a_application a");
    if session
        .wait_for(&applying_link, NEW_WINDOW_WAIT)
        .await
        .is_err()
    {
        return Ok(Some(instructions_url));
    }
    match session.click_through(&applying_link, NEW_WINDOW_WAIT).await {
        Ok(Some(final_url)) => Ok(Some(final_url)),
        Ok(None) => Ok(Some(current_or(session, instructions_url).await)),
        Err(SessionError::ElementMissing(_)) | Err(SessionError::Timeout(_)) => {
            Ok(Some(instructions_url))
        }
        Err(SessionError::WebDriver(message)) => Err(ExtractError::SessionCrashed(message)),
    }
}

async fn read_href(
    session: &dyn BrowserSession,
    target: &Target,
) -> Result<Option<String>, ExtractError> {
    match session.attr_of(target, "href").await {
        Ok(href) => Ok(href.filter(|h| !h.is_empty())),
        Err(SessionError::ElementMissing(_)) | Err(SessionError::Timeout(_)) => Ok(None),
        Err(SessionError::WebDriver(message)) => Err(ExtractError::SessionCrashed(message)),
    }
}

async fn current_or(session: &dyn BrowserSession, fallback: String) -> String {
    session.current_url().await.unwrap_or(fallback)
}
