use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info};
use waypost_common::{Platform, Screenshot};
use waypost_config::WaypostConfig;
use waypost_http::HttpError;

use crate::dry_run::DryRunPublisher;
use crate::mastodon::MastodonPublisher;
use crate::twitter::TwitterPublisher;

#[derive(thiserror::Error, Debug)]
pub enum SocialError {
    #[error("{platform} is not configured, missing: {}", .missing.join(", "))]
    NotConfigured {
        platform: Platform,
        missing: Vec<&'static str>,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request signing failed: {0}")]
    Signing(String),
}

impl SocialError {
    /// Status code and reason for failed API calls, for diagnostics.
    pub fn status_and_reason(&self) -> (Option<u16>, &'static str) {
        match self {
            SocialError::Http(e) => (e.status().map(|s| s.as_u16()), e.reason()),
            _ => (None, "-"),
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Implementation label for logs (`twitter`, `mastodon`, `dry-run`).
    fn kind(&self) -> &'static str;

    /// Upload `media` when present, then post `status`.
    ///
    /// `Ok(None)` means the platform accepted the post without reporting an id.
    async fn publish(
        &self,
        status: &str,
        media: Option<&Screenshot>,
    ) -> Result<Option<String>, SocialError>;
}

/// A platform's publisher, or the reason it cannot publish.
///
/// Credential problems are detected once at start-up and reported on every
/// run, so a misconfigured platform is loud without stopping the other one.
pub struct PublisherSlot {
    platform: Platform,
    publisher: Result<Arc<dyn Publisher>, Vec<&'static str>>,
}

impl PublisherSlot {
    pub fn ready(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            platform: publisher.platform(),
            publisher: Ok(publisher),
        }
    }

    pub fn unconfigured(platform: Platform, missing: Vec<&'static str>) -> Self {
        Self {
            platform,
            publisher: Err(missing),
        }
    }

    /// Real publishers in production, dry-run ones in development. Either way
    /// the credential set must be complete.
    pub fn from_config(platform: Platform, config: &WaypostConfig) -> Result<Self, SocialError> {
        let missing = match platform {
            Platform::Twitter => config.twitter.missing_credentials(),
            Platform::Mastodon => config.mastodon.missing_credentials(),
        };
        if !missing.is_empty() {
            return Ok(Self::unconfigured(platform, missing));
        }

        let publisher: Arc<dyn Publisher> = if config.mode().is_dev() {
            Arc::new(DryRunPublisher::new(platform))
        } else {
            match platform {
                Platform::Twitter => Arc::new(TwitterPublisher::from_config(
                    &config.twitter,
                    config.user_agent(),
                )?),
                Platform::Mastodon => Arc::new(MastodonPublisher::from_config(
                    &config.mastodon,
                    config.user_agent(),
                )?),
            }
        };
        info!(platform = %platform, kind = publisher.kind(), "publisher.ready");
        Ok(Self::ready(publisher))
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_ready(&self) -> bool {
        self.publisher.is_ok()
    }

    /// Publish without letting any failure, including a panic, escape.
    pub async fn publish_isolated(
        &self,
        status: &str,
        media: Option<&Screenshot>,
    ) -> Option<String> {
        let publisher = match &self.publisher {
            Ok(p) => p,
            Err(missing) => {
                let err = SocialError::NotConfigured {
                    platform: self.platform,
                    missing: missing.clone(),
                };
                error!(platform = %self.platform, error = %err, "publish.skipped");
                return None;
            }
        };

        let outcome = AssertUnwindSafe(publisher.publish(status, media))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(Some(id))) => {
                info!(platform = %self.platform, kind = publisher.kind(), %id, "publish.ok");
                Some(id)
            }
            Ok(Ok(None)) => {
                info!(platform = %self.platform, kind = publisher.kind(), "publish.ok_without_id");
                None
            }
            Ok(Err(err)) => {
                let (status_code, reason) = err.status_and_reason();
                error!(
                    platform = %self.platform,
                    status_code,
                    reason,
                    error = %err,
                    text = %status,
                    "publish.failed"
                );
                None
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".into());
                error!(platform = %self.platform, panic = %msg, text = %status, "publish.panicked");
                None
            }
        }
    }
}
