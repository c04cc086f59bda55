//! Twitter/X publisher: v1.1 media upload, then a v2 tweet, both signed with
//! OAuth 1.0a user-context credentials.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use waypost_common::{Platform, Screenshot};
use waypost_config::TwitterConfig;
use waypost_http::header::{AUTHORIZATION, HeaderValue};
use waypost_http::{Auth, HttpClient, Method, Part, RequestOpts, Url};

use crate::oauth::{OAuth1Credentials, OAuth1Signer};
use crate::{Publisher, SocialError, json_id};

const UPLOAD_PATH: &str = "1.1/media/upload.json";
const TWEET_PATH: &str = "2/tweets";
const MEDIA_CATEGORY: &str = "tweet_image";

pub struct TwitterPublisher {
    api: HttpClient,
    upload: HttpClient,
    signer: OAuth1Signer,
}

impl TwitterPublisher {
    pub fn new(
        api_url: &str,
        upload_url: &str,
        creds: OAuth1Credentials,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, SocialError> {
        Ok(Self {
            api: HttpClient::new(api_url)?
                .with_timeout(timeout)
                .with_user_agent(user_agent)?,
            upload: HttpClient::new(upload_url)?
                .with_timeout(timeout)
                .with_user_agent(user_agent)?,
            signer: OAuth1Signer::new(creds),
        })
    }

    pub fn from_config(config: &TwitterConfig, user_agent: &str) -> Result<Self, SocialError> {
        let missing = config.missing_credentials();
        let creds = match (
            &config.consumer_key,
            &config.consumer_secret,
            &config.access_token,
            &config.access_token_secret,
        ) {
            (Some(ck), Some(cs), Some(at), Some(ats)) if missing.is_empty() => OAuth1Credentials {
                consumer_key: ck.trim().to_string(),
                consumer_secret: cs.trim().to_string(),
                token: at.trim().to_string(),
                token_secret: ats.trim().to_string(),
            },
            _ => {
                return Err(SocialError::NotConfigured {
                    platform: Platform::Twitter,
                    missing,
                });
            }
        };

        Self::new(
            &config.api_url,
            &config.upload_url,
            creds,
            Duration::from_secs(config.timeout_secs),
            user_agent,
        )
    }

    fn auth_header(
        &self,
        url: &Url,
        extra_params: &[(&str, &str)],
    ) -> Result<Auth<'static>, SocialError> {
        let value = self.signer.authorization(&Method::POST, url, extra_params)?;
        let value = HeaderValue::from_str(&value).map_err(|e| SocialError::Signing(e.to_string()))?;
        Ok(Auth::Header {
            name: AUTHORIZATION,
            value,
        })
    }

    async fn upload_media(&self, shot: &Screenshot) -> Result<Option<String>, SocialError> {
        let mut signed_url = self.upload.resolve(UPLOAD_PATH, false)?;
        signed_url
            .query_pairs_mut()
            .append_pair("media_category", MEDIA_CATEGORY);

        let reply: Value = self
            .upload
            .post_multipart_json(
                UPLOAD_PATH,
                vec![Part::File {
                    name: "media",
                    filename: &shot.filename,
                    mime: &shot.mime_type,
                    bytes: &shot.bytes,
                }],
                RequestOpts {
                    auth: Some(self.auth_header(&signed_url, &[])?),
                    query: Some(vec![("media_category", Cow::Borrowed(MEDIA_CATEGORY))]),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        Ok(json_id(&reply, "/media_id_string").or_else(|| json_id(&reply, "/media_id")))
    }

    async fn create_tweet(
        &self,
        text: &str,
        media_id: Option<&str>,
    ) -> Result<Option<String>, SocialError> {
        let url = self.api.resolve(TWEET_PATH, false)?;
        let mut body = json!({ "text": text });
        if let Some(id) = media_id {
            body["media"] = json!({ "media_ids": [id] });
        }

        let reply: Value = self
            .api
            .post_json_opts(
                TWEET_PATH,
                &body,
                RequestOpts {
                    auth: Some(self.auth_header(&url, &[])?),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        Ok(json_id(&reply, "/data/id"))
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn kind(&self) -> &'static str {
        "twitter"
    }

    async fn publish(
        &self,
        status: &str,
        media: Option<&Screenshot>,
    ) -> Result<Option<String>, SocialError> {
        let media_id = match media {
            Some(shot) => match self.upload_media(shot).await {
                Ok(id) => {
                    debug!(media_id = ?id, "twitter.media_uploaded");
                    id
                }
                Err(e) => {
                    let (status_code, reason) = e.status_and_reason();
                    warn!(status_code, reason, error = %e, "twitter.media_upload_failed");
                    None
                }
            },
            None => None,
        };
        self.create_tweet(status, media_id.as_deref()).await
    }
}
