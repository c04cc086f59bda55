//! Mastodon publisher: `POST /api/v1/media`, then `POST /api/v1/statuses`.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use waypost_common::{Platform, Screenshot};
use waypost_config::MastodonConfig;
use waypost_http::{Auth, HttpClient, Part, RequestOpts};

use crate::{Publisher, SocialError, json_id};

/// Keep the top edge of a screenshot in the preview crop.
const FOCUS: &str = "0,1";

pub struct MastodonPublisher {
    http: HttpClient,
    token: String,
    upload_timeout: Duration,
    post_timeout: Duration,
}

impl MastodonPublisher {
    pub fn new(
        instance_url: &str,
        token: &str,
        upload_timeout: Duration,
        post_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, SocialError> {
        Ok(Self {
            http: HttpClient::new(instance_url)?.with_user_agent(user_agent)?,
            token: token.trim().to_string(),
            upload_timeout,
            post_timeout,
        })
    }

    pub fn from_config(config: &MastodonConfig, user_agent: &str) -> Result<Self, SocialError> {
        let Some(token) = config.access_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Err(SocialError::NotConfigured {
                platform: Platform::Mastodon,
                missing: config.missing_credentials(),
            });
        };
        Self::new(
            &config.instance_url,
            token,
            Duration::from_secs(config.upload_timeout_secs),
            Duration::from_secs(config.post_timeout_secs),
            user_agent,
        )
    }

    async fn upload_media(&self, shot: &Screenshot) -> Result<Option<String>, SocialError> {
        let reply: Value = self
            .http
            .post_multipart_json(
                "api/v1/media",
                vec![
                    Part::File {
                        name: "file",
                        filename: &shot.filename,
                        mime: &shot.mime_type,
                        bytes: &shot.bytes,
                    },
                    Part::Text {
                        name: "description",
                        value: Cow::Borrowed(shot.description.as_str()),
                    },
                    Part::Text {
                        name: "focus",
                        value: Cow::Borrowed(FOCUS),
                    },
                ],
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.token)),
                    timeout: Some(self.upload_timeout),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        Ok(json_id(&reply, "/id"))
    }

    async fn post_status(
        &self,
        text: &str,
        media_id: Option<&str>,
    ) -> Result<Option<String>, SocialError> {
        let mut form = vec![("status", Cow::Borrowed(text))];
        if let Some(id) = media_id {
            form.push(("media_ids[]", Cow::Borrowed(id)));
        }

        let reply: Value = self
            .http
            .post_form_json(
                "api/v1/statuses",
                form,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.token)),
                    timeout: Some(self.post_timeout),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        Ok(json_id(&reply, "/id"))
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn platform(&self) -> Platform {
        Platform::Mastodon
    }

    fn kind(&self) -> &'static str {
        "mastodon"
    }

    async fn publish(
        &self,
        status: &str,
        media: Option<&Screenshot>,
    ) -> Result<Option<String>, SocialError> {
        let media_id = match media {
            Some(shot) => match self.upload_media(shot).await {
                Ok(id) => {
                    debug!(media_id = ?id, "mastodon.media_uploaded");
                    id
                }
                Err(e) => {
                    let (status_code, reason) = e.status_and_reason();
                    warn!(status_code, reason, error = %e, "mastodon.media_upload_failed");
                    None
                }
            },
            None => None,
        };
        self.post_status(status, media_id.as_deref()).await
    }
}
