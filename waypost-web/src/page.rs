//! Candidate page inspection.

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{info, warn};
use waypost_common::PageInfo;
use waypost_config::WaypostConfig;
use waypost_http::{HttpClient, RequestOpts};

static TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("title").ok());

static CREATOR: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="twitter:creator"], meta[property="twitter:creator"]"#).ok()
});

/// Fetches a candidate and decides whether it is worth posting.
#[derive(Debug, Clone)]
pub struct PageInspector {
    user_agent: String,
    timeout: Duration,
    sentinel_titles: Vec<String>,
}

impl PageInspector {
    pub fn new(user_agent: &str, timeout: Duration, sentinel_titles: Vec<String>) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            timeout,
            sentinel_titles,
        }
    }

    pub fn from_config(config: &WaypostConfig) -> Self {
        Self::new(
            config.user_agent(),
            Duration::from_secs(config.page.timeout_secs),
            config.page.sentinel_titles.clone(),
        )
    }

    /// Any transport error or non-success status makes the page invalid.
    pub async fn inspect(&self, url: &str) -> PageInfo {
        let client = match HttpClient::new(url).and_then(|c| c.with_user_agent(&self.user_agent)) {
            Ok(c) => c.with_timeout(self.timeout),
            Err(e) => {
                warn!(%url, error = %e, "page.bad_url");
                return PageInfo::invalid();
            }
        };

        let html = match client
            .get_text(
                url,
                RequestOpts {
                    allow_absolute: true,
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, status = ?e.status(), error = %e, "page.fetch_failed");
                return PageInfo::invalid();
            }
        };

        let info = self.inspect_html(&html);
        if info.valid {
            info!(%url, title = %info.title, handle = ?info.attributed_handle, "page.inspected");
        } else {
            warn!(%url, title = %info.title, "page.sentinel_title");
        }
        info
    }

    /// Title and attribution from an already fetched document.
    pub fn inspect_html(&self, html: &str) -> PageInfo {
        let doc = Html::parse_document(html);

        let title = TITLE
            .as_ref()
            .and_then(|sel| doc.select(sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if self.sentinel_titles.iter().any(|s| *s == title) {
            return PageInfo {
                title,
                ..PageInfo::invalid()
            };
        }

        let attributed_handle = CREATOR
            .as_ref()
            .and_then(|sel| doc.select(sel).next())
            .and_then(|el| el.value().attr("content"))
            .and_then(attribution_handle);

        PageInfo {
            title,
            attributed_handle,
            valid: true,
        }
    }
}

/// Normalise a `twitter:creator` value into a bare handle.
///
/// Accepts `@name`, `name` or a profile URL. Values that still contain
/// whitespace after normalisation are malformed and dropped.
///
/// ```
/// use waypost_web::attribution_handle;
///
/// assert_eq!(attribution_handle("@rustlang").as_deref(), Some("rustlang"));
/// assert_eq!(attribution_handle("https://twitter.com/foo/bar baz"), None);
/// ```
pub fn attribution_handle(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix('@').unwrap_or(raw);
    let last = raw.split('/').rfind(|p| !p.is_empty())?;
    let last = last.trim();
    let handle = last.strip_prefix('@').unwrap_or(last);
    if handle.is_empty() || handle.chars().any(char::is_whitespace) {
        return None;
    }
    Some(handle.to_string())
}
