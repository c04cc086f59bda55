//! The three anonymous random-website services.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use url::Url;
use waypost_http::{HttpClient, HttpError, RequestOpts};

use super::DiscoverySource;
use crate::service_client;

/// StumblingOn: `POST /getSite` with a bot user id.
pub struct StumblingOnSource {
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct StumbleReply {
    #[serde(default)]
    ok: bool,
    url: Option<String>,
}

impl StumblingOnSource {
    const USER_ID: &'static str = "randomwebsitebot";

    pub fn new(base: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: service_client(base, timeout_secs, user_agent)?,
        })
    }
}

#[async_trait]
impl DiscoverySource for StumblingOnSource {
    fn name(&self) -> &'static str {
        "stumbling_on"
    }

    async fn candidate(&self) -> Option<String> {
        let body = json!({ "userId": Self::USER_ID, "prevId": "" });
        let reply: StumbleReply = self
            .http
            .post_json_opts("getSite", &body, RequestOpts::default())
            .await
            .map_err(|e| warn!(source = self.name(), error = %e, "discovery.request_failed"))
            .ok()?;
        if !reply.ok {
            return None;
        }
        non_empty(reply.url)
    }
}

/// The Forest: `GET /api/site/` answers `{ "content": "<url>" }`.
pub struct ForestLinkSource {
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct ForestReply {
    content: Option<String>,
}

impl ForestLinkSource {
    pub fn new(base: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: service_client(base, timeout_secs, user_agent)?,
        })
    }
}

#[async_trait]
impl DiscoverySource for ForestLinkSource {
    fn name(&self) -> &'static str {
        "forest_link"
    }

    async fn candidate(&self) -> Option<String> {
        let reply: ForestReply = self
            .http
            .get_json("api/site/", RequestOpts::default())
            .await
            .map_err(|e| warn!(source = self.name(), error = %e, "discovery.request_failed"))
            .ok()?;
        non_empty(reply.content)
    }
}

/// Wiby: `GET /surprise/` is an HTML page that meta-refreshes to the pick.
pub struct WibySource {
    http: HttpClient,
}

impl WibySource {
    pub fn new(base: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http: service_client(base, timeout_secs, user_agent)?,
        })
    }
}

#[async_trait]
impl DiscoverySource for WibySource {
    fn name(&self) -> &'static str {
        "wiby"
    }

    async fn candidate(&self) -> Option<String> {
        let html = self
            .http
            .get_text("surprise/", RequestOpts::default())
            .await
            .map_err(|e| warn!(source = self.name(), error = %e, "discovery.request_failed"))
            .ok()?;

        let Some(target) = refresh_target(&html) else {
            warn!(source = self.name(), "discovery.wiby.no_refresh");
            return None;
        };
        // Relative refresh targets resolve against the page that carried them.
        match Url::parse(&target) {
            Ok(abs) => Some(abs.into()),
            Err(_) => self
                .http
                .resolve("surprise/", false)
                .and_then(|page| {
                    page.join(&target)
                        .map_err(|e| HttpError::Url(e.to_string()))
                })
                .map(String::from)
                .ok(),
        }
    }
}

static META_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("meta[http-equiv]").ok());

static REFRESH_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)url\s*=\s*['"]?([^'"\s]+)"#).ok());

fn refresh_target(html: &str) -> Option<String> {
    let selector = META_SELECTOR.as_ref()?;
    let doc = Html::parse_document(html);
    doc.select(selector)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .find_map(|el| el.value().attr("content").and_then(parse_meta_refresh))
}

/// Target of a meta refresh `content` value such as `0; url='https://x.y/'`.
///
/// ```
/// use waypost_web::parse_meta_refresh;
///
/// assert_eq!(
///     parse_meta_refresh("0; URL='http://example.com/'").as_deref(),
///     Some("http://example.com/")
/// );
/// assert_eq!(parse_meta_refresh("5"), None);
/// ```
pub fn parse_meta_refresh(content: &str) -> Option<String> {
    REFRESH_URL
        .as_ref()?
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
