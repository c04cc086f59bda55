//! Discussion aggregator lookup: existing threads and topic tags for a URL.

use serde::Deserialize;
use tracing::{debug, warn};
use waypost_common::DiscussionInfo;
use waypost_config::WaypostConfig;
use waypost_http::{Auth, HttpClient, HttpError, RequestOpts};

use crate::service_client;

#[derive(Debug, Default, Deserialize)]
struct DiscussionCounts {
    #[serde(default)]
    total_comments: Option<i64>,
    #[serde(default)]
    total_discussions: Option<i64>,
    #[serde(default)]
    articles_count: Option<i64>,
    #[serde(default)]
    discussions_url: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl DiscussionCounts {
    fn has_signal(&self) -> bool {
        [self.total_comments, self.total_discussions, self.articles_count]
            .into_iter()
            .any(|n| n.unwrap_or(0) != 0)
    }
}

impl From<DiscussionCounts> for DiscussionInfo {
    fn from(c: DiscussionCounts) -> Self {
        if !c.has_signal() {
            return DiscussionInfo::default();
        }
        DiscussionInfo {
            discussions_url: c.discussions_url.filter(|u| !u.trim().is_empty()),
            tags: c.tags,
        }
    }
}

pub struct DiscussionLookup {
    http: HttpClient,
    token: Option<String>,
}

impl DiscussionLookup {
    pub fn new(
        base: &str,
        token: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            http: service_client(base, timeout_secs, user_agent)?,
            token,
        })
    }

    pub fn from_config(config: &WaypostConfig) -> Result<Self, HttpError> {
        let d = &config.discussions;
        Self::new(
            &d.base_url,
            d.access_token.clone(),
            d.timeout_secs,
            config.user_agent(),
        )
    }

    /// Never fails the run: errors and empty answers both give an empty
    /// [`DiscussionInfo`].
    pub async fn lookup(&self, url: &str) -> DiscussionInfo {
        let path = format!("api/v0/discussion_counts/url/{}", encode_target(url));
        let opts = RequestOpts {
            auth: self.token.as_deref().map(Auth::Bearer),
            ..Default::default()
        };

        match self.http.get_json::<DiscussionCounts>(&path, opts).await {
            Ok(counts) => {
                let info = DiscussionInfo::from(counts);
                debug!(
                    %url,
                    discussions_url = ?info.discussions_url,
                    tags = ?info.tags,
                    "discussions.found"
                );
                info
            }
            Err(e) => {
                warn!(%url, status = ?e.status(), error = %e, "discussions.lookup_failed");
                DiscussionInfo::default()
            }
        }
    }
}

/// Percent-encode the target URL as a single path tail, leaving `/` readable.
fn encode_target(url: &str) -> String {
    urlencoding::encode(url).replace("%2F", "/")
}
