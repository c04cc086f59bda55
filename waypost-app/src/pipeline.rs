//! One posting run: discover -> check -> inspect -> discussions -> screenshot
//! -> format -> publish Twitter/X -> publish Mastodon, strictly in order.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;
use waypost_common::Platform;
use waypost_config::WaypostConfig;
use waypost_social::{PublisherSlot, StatusParts, build_status};
use waypost_web::{DiscussionLookup, PageInspector, ScreenshotClient, WeightedSelector};

use crate::scheduler::Job;

/// A publishing target and whether its posts credit the page's author.
pub struct Target {
    pub slot: PublisherSlot,
    pub attribution: bool,
}

pub struct Pipeline {
    pub selector: WeightedSelector,
    pub inspector: PageInspector,
    pub discussions: DiscussionLookup,
    /// `None` skips screenshots entirely (development mode).
    pub screenshots: Option<ScreenshotClient>,
    pub targets: Vec<Target>,
}

impl Pipeline {
    pub fn from_config(cfg: &WaypostConfig) -> Result<Self> {
        let screenshots = if cfg.mode().is_dev() {
            None
        } else {
            Some(ScreenshotClient::from_config(cfg)?)
        };

        let mut targets = Vec::with_capacity(2);
        for platform in [Platform::Twitter, Platform::Mastodon] {
            let slot = PublisherSlot::from_config(platform, cfg)?;
            if !slot.is_ready() {
                warn!(%platform, "pipeline.publisher_unconfigured");
            }
            targets.push(Target {
                slot,
                attribution: cfg.attribution_for(platform),
            });
        }

        Ok(Self {
            selector: WeightedSelector::from_config(cfg)?,
            inspector: PageInspector::from_config(cfg),
            discussions: DiscussionLookup::from_config(cfg)?,
            screenshots,
            targets,
        })
    }

    /// `Ok(false)` when there was nothing worth posting.
    pub async fn execute(&self) -> Result<bool> {
        let Some(url) = self.selector.discover().await else {
            warn!("pipeline.no_candidate");
            return Ok(false);
        };
        if is_blacklisted(&url) {
            warn!(%url, "pipeline.blacklisted");
            return Ok(false);
        }

        let page = self.inspector.inspect(&url).await;
        if !page.valid {
            warn!(%url, "pipeline.cannot_fetch_website");
            return Ok(false);
        }

        let discussion = self.discussions.lookup(&url).await;

        let screenshot = match &self.screenshots {
            Some(client) => client.capture(&url).await,
            None => None,
        };

        let tags = discussion.tags.clone().unwrap_or_default();
        for target in &self.targets {
            let by_account = if target.attribution {
                page.attributed_handle.as_deref()
            } else {
                None
            };
            let status = build_status(&StatusParts {
                title: &page.title,
                url: &url,
                discussions_url: discussion.discussions_url.as_deref(),
                tags: &tags,
                by_account,
            });
            let id = target
                .slot
                .publish_isolated(&status, screenshot.as_ref())
                .await;
            info!(platform = %target.slot.platform(), id = ?id, "pipeline.published");
        }

        Ok(true)
    }
}

#[async_trait]
impl Job for Pipeline {
    async fn run_once(&self) -> Result<bool> {
        self.execute().await
    }
}

/// Empty or non-web candidates are never posted.
pub fn is_blacklisted(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return true;
    }
    match Url::parse(url) {
        Ok(u) => !matches!(u.scheme(), "http" | "https") || u.host_str().is_none(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use waypost_common::Screenshot;
    use waypost_social::{Publisher, SocialError};
    use waypost_web::DiscoverySource;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedSource(String);

    #[async_trait]
    impl DiscoverySource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn candidate(&self) -> Option<String> {
            Some(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Recording {
        posts: Mutex<Vec<(String, bool)>>,
    }

    struct RecordingPublisher(Platform, Arc<Recording>);

    #[async_trait]
    impl Publisher for RecordingPublisher {
        fn platform(&self) -> Platform {
            self.0
        }

        fn kind(&self) -> &'static str {
            "recording"
        }

        async fn publish(
            &self,
            status: &str,
            media: Option<&Screenshot>,
        ) -> Result<Option<String>, SocialError> {
            if let Ok(mut posts) = self.1.posts.lock() {
                posts.push((status.to_string(), media.is_some()));
            }
            Ok(Some("1".into()))
        }
    }

    async fn site(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/site"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Example Site</title>
                   <meta name="twitter:creator" content="@maker"></head></html>"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/v0/discussion_counts/url/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_comments": 4,
                "discussions_url": "https://discu.eu/?q=site",
                "tags": ["rust", "c"]
            })))
            .mount(server)
            .await;
    }

    fn pipeline(server: &MockServer, candidate: String, log: &Arc<Recording>) -> Pipeline {
        Pipeline {
            selector: WeightedSelector::new().with_source(FixedSource(candidate), 1),
            inspector: PageInspector::new("test", Duration::from_secs(5), vec![]),
            discussions: DiscussionLookup::new(&server.uri(), None, 5, "test").unwrap(),
            screenshots: None,
            targets: vec![
                Target {
                    slot: PublisherSlot::ready(Arc::new(RecordingPublisher(
                        Platform::Twitter,
                        log.clone(),
                    ))),
                    attribution: true,
                },
                Target {
                    slot: PublisherSlot::ready(Arc::new(RecordingPublisher(
                        Platform::Mastodon,
                        log.clone(),
                    ))),
                    attribution: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn full_run_posts_both_variants_in_order() {
        let server = MockServer::start().await;
        site(&server).await;
        let log = Arc::new(Recording::default());
        let url = format!("{}/site", server.uri());

        assert!(pipeline(&server, url.clone(), &log).execute().await.unwrap());

        let posts = log.posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 2);
        let body = format!(
            "Example Site\n\n{url}\n\nDiscussions: https://discu.eu/?q=site\n\n#cprogramming #rust"
        );
        assert_eq!(posts[0], (format!("{body}\n\nby @maker"), false));
        assert_eq!(posts[1], (body, false));
    }

    #[tokio::test]
    async fn invalid_pages_abort_before_publishing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let log = Arc::new(Recording::default());

        let ok = pipeline(&server, format!("{}/missing", server.uri()), &log)
            .execute()
            .await
            .unwrap();
        assert!(!ok);
        assert!(log.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blacklisted_candidates_are_not_fetched() {
        let server = MockServer::start().await;
        let log = Arc::new(Recording::default());

        let ok = pipeline(&server, "ftp://files.example/".into(), &log)
            .execute()
            .await
            .unwrap();
        assert!(!ok);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn blacklist_rules() {
        assert!(is_blacklisted(""));
        assert!(is_blacklisted("   "));
        assert!(is_blacklisted("not a url"));
        assert!(is_blacklisted("javascript:alert(1)"));
        assert!(is_blacklisted("mailto:someone@example.com"));
        assert!(!is_blacklisted("https://example.com"));
        assert!(!is_blacklisted("http://old.example/page.html"));
    }
}
