//! Rendered screenshots from an external screenshot service.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{info, warn};
use waypost_common::Screenshot;
use waypost_config::WaypostConfig;
use waypost_http::{Auth, HttpClient, HttpError, RequestOpts};

use crate::service_client;

#[derive(Debug, Deserialize)]
struct ScreenshotReply {
    content: String,
    media_type: String,
}

pub struct ScreenshotClient {
    http: HttpClient,
    token: Option<String>,
    full_page: bool,
}

impl ScreenshotClient {
    pub fn new(
        base: &str,
        token: Option<String>,
        full_page: bool,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            http: service_client(base, timeout_secs, user_agent)?,
            token,
            full_page,
        })
    }

    pub fn from_config(config: &WaypostConfig) -> Result<Self, HttpError> {
        let s = &config.screenshot;
        Self::new(
            &s.base_url,
            s.bearer_token.clone(),
            s.full_page,
            s.timeout_secs,
            config.user_agent(),
        )
    }

    /// Always optional: without a token, or on any failure, the post simply
    /// goes out without media.
    pub async fn capture(&self, url: &str) -> Option<Screenshot> {
        let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!("screenshot.missing_token");
            return None;
        };

        let opts = RequestOpts {
            auth: Some(Auth::Bearer(token)),
            query: Some(vec![
                ("url", Cow::Borrowed(url)),
                // the service reads the capitalised form
                ("full_page", Cow::Borrowed(if self.full_page { "True" } else { "False" })),
            ]),
            ..Default::default()
        };
        let reply: ScreenshotReply = match self.http.get_json("api/v0/screenshot", opts).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, status = ?e.status(), error = %e, "screenshot.request_failed");
                return None;
            }
        };

        let bytes = match STANDARD.decode(reply.content.trim()) {
            Ok(b) if !b.is_empty() => b,
            Ok(_) => {
                warn!(%url, "screenshot.empty_image");
                return None;
            }
            Err(e) => {
                warn!(%url, error = %e, "screenshot.bad_base64");
                return None;
            }
        };

        let ext = extension_for_mime(&reply.media_type);
        info!(%url, mime = %reply.media_type, bytes = bytes.len(), "screenshot.captured");
        Some(Screenshot {
            filename: format!("screenshot.{ext}"),
            bytes,
            mime_type: reply.media_type,
            description: format!("Screenshot of {url} taken with SpiderAPI"),
        })
    }
}

/// File extension for a declared image MIME type, `dat` when unknown.
///
/// ```
/// use waypost_web::extension_for_mime;
///
/// assert_eq!(extension_for_mime("image/png"), "png");
/// assert_eq!(extension_for_mime("application/x-unknown-thing"), "dat");
/// ```
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("dat"),
    }
}
