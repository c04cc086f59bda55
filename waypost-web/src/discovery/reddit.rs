//! Reddit as a discovery source: a random post from a configured subreddit,
//! accepted only if it links out to a reasonably popular, safe website.
//!
//! Authentication uses the application-only OAuth flow
//! (`grant_type=client_credentials`), so no user account is involved.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use waypost_config::RedditConfig;
use waypost_http::{Auth, HttpClient, HttpError, RequestOpts};

use super::DiscoverySource;
use crate::service_client;

/// The subset of a Reddit link post we filter on.
///
/// Moderation fields are kept as raw JSON because Reddit reports them as
/// `null`, `false`, strings or timestamps depending on the post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditPost {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub banned_by: Option<Value>,
    #[serde(default)]
    pub banned_at_utc: Option<Value>,
    #[serde(default)]
    pub removed_by: Option<Value>,
    #[serde(default)]
    pub removed_by_category: Option<Value>,
    #[serde(default)]
    pub removal_reason: Option<Value>,
    #[serde(default)]
    pub is_reddit_media_domain: Option<Value>,
    #[serde(default)]
    pub is_video: Option<Value>,
    #[serde(default)]
    pub is_self: Option<Value>,
    #[serde(default)]
    pub media: Option<Value>,
    #[serde(default)]
    pub over_18: Option<Value>,
}

fn truthy(v: &Option<Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

impl RedditPost {
    fn rejected(&self) -> bool {
        [
            &self.banned_by,
            &self.banned_at_utc,
            &self.removed_by,
            &self.removed_by_category,
            &self.removal_reason,
            &self.is_reddit_media_domain,
            &self.is_video,
            &self.is_self,
            &self.media,
            &self.over_18,
        ]
        .into_iter()
        .any(truthy)
    }

    /// A linked website that is not moderated away, not media, not NSFW and
    /// popular enough. Missing counters count as zero.
    pub fn is_postable(&self, min_score: i64, min_comments: u64) -> bool {
        if self.rejected() {
            return false;
        }
        if self.score.unwrap_or(0) < min_score {
            return false;
        }
        let comments = u64::try_from(self.num_comments.unwrap_or(0)).unwrap_or(0);
        if comments < min_comments {
            return false;
        }
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// `/r/{sub}/random` answers with a `[post listing, comments listing]` pair,
    /// occasionally with a bare listing. Either way the post is the first child.
    pub fn from_random_listing(body: &Value) -> Option<Self> {
        let listing = match body {
            Value::Array(items) => items.first()?,
            other => other,
        };
        let post = listing.pointer("/data/children/0/data")?;
        serde_json::from_value(post.clone()).ok()
    }
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
}

pub struct RedditSource {
    auth: HttpClient,
    api: HttpClient,
    client_id: Option<String>,
    client_secret: Option<String>,
    subreddits: Vec<String>,
    min_score: i64,
    min_comments: u64,
    attempts: u32,
    attempt_delay: Duration,
}

impl RedditSource {
    pub fn from_config(config: &RedditConfig, user_agent: &str) -> Result<Self, HttpError> {
        Ok(Self {
            auth: service_client(&config.auth_url, config.timeout_secs, user_agent)?,
            api: service_client(&config.api_url, config.timeout_secs, user_agent)?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            subreddits: config.subreddits.clone(),
            min_score: config.min_score,
            min_comments: config.min_comments,
            attempts: config.attempts,
            attempt_delay: Duration::from_millis(config.attempt_delay_ms),
        })
    }

    async fn access_token(&self) -> Result<String, HttpError> {
        let user = self.client_id.as_deref().unwrap_or_default();
        let reply: TokenReply = self
            .auth
            .post_form_json(
                "api/v1/access_token",
                vec![("grant_type", Cow::Borrowed("client_credentials"))],
                RequestOpts {
                    auth: Some(Auth::Basic {
                        user,
                        password: self.client_secret.as_deref(),
                    }),
                    ..Default::default()
                },
            )
            .await?;
        Ok(reply.access_token)
    }

    async fn random_post(&self, subreddit: &str, token: &str) -> Result<Option<RedditPost>, HttpError> {
        let body: Value = self
            .api
            .get_json(
                &format!("r/{subreddit}/random"),
                RequestOpts {
                    auth: Some(Auth::Bearer(token)),
                    ..Default::default()
                },
            )
            .await?;
        Ok(RedditPost::from_random_listing(&body))
    }
}

#[async_trait]
impl DiscoverySource for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn candidate(&self) -> Option<String> {
        if self.client_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            warn!(source = self.name(), "discovery.reddit.missing_client_id");
            return None;
        }
        let subreddit = self.subreddits.choose(&mut rand::thread_rng())?.clone();

        let token = self
            .access_token()
            .await
            .map_err(|e| warn!(source = self.name(), error = %e, "discovery.reddit.token_failed"))
            .ok()?;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.attempt_delay).await;
            }
            match self.random_post(&subreddit, &token).await {
                Ok(Some(post)) if post.is_postable(self.min_score, self.min_comments) => {
                    return post.url.map(|u| u.trim().to_string());
                }
                Ok(Some(post)) => {
                    debug!(
                        %subreddit,
                        attempt = attempt + 1,
                        score = ?post.score,
                        comments = ?post.num_comments,
                        "discovery.reddit.post_rejected"
                    );
                }
                Ok(None) => {
                    debug!(%subreddit, attempt = attempt + 1, "discovery.reddit.unexpected_shape");
                }
                Err(e) => {
                    warn!(%subreddit, attempt = attempt + 1, error = %e, "discovery.reddit.request_failed");
                }
            }
        }
        None
    }
}
