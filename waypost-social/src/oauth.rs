//! OAuth 1.0a request signing (HMAC-SHA1, user context).
//!
//! Only what a posting bot needs: build the `Authorization: OAuth ...` header
//! for a request whose signed parameters are the URL query plus any
//! form-encoded body fields. JSON and multipart bodies are never signed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use waypost_http::{Method, Url};

use crate::SocialError;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// RFC 3986 percent-encoding, as OAuth requires (`~` stays, space is `%20`).
fn enc(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &"<redacted>")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct OAuth1Signer {
    creds: OAuth1Credentials,
}

impl OAuth1Signer {
    pub fn new(creds: OAuth1Credentials) -> Self {
        Self { creds }
    }

    /// Header value for a request made now, with a fresh nonce.
    pub fn authorization(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(&str, &str)],
    ) -> Result<String, SocialError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_with(method, url, extra_params, &nonce, &timestamp)
    }

    /// Deterministic variant of [`OAuth1Signer::authorization`].
    pub fn authorization_with(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, SocialError> {
        let oauth = self.oauth_params(nonce, timestamp);
        let signature = self.signature(method, url, extra_params, &oauth)?;

        let mut fields: Vec<(&str, &str)> = oauth.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.push(("oauth_signature", signature.as_str()));
        fields.sort();

        let rendered = fields
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", enc(k), enc(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {rendered}"))
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.creds.consumer_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_token", self.creds.token.clone()),
            ("oauth_version", VERSION.to_string()),
        ]
    }

    fn signature(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(&str, &str)],
        oauth: &[(&'static str, String)],
    ) -> Result<String, SocialError> {
        let base = signature_base(method, url, extra_params, oauth);
        let key = format!(
            "{}&{}",
            enc(&self.creds.consumer_secret),
            enc(&self.creds.token_secret)
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| SocialError::Signing(e.to_string()))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn signature_base(
    method: &Method,
    url: &Url,
    extra_params: &[(&str, &str)],
    oauth: &[(&'static str, String)],
) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (enc(&k), enc(&v)))
        .chain(extra_params.iter().map(|(k, v)| (enc(k), enc(v))))
        .chain(oauth.iter().map(|(k, v)| (enc(k), enc(v))))
        .collect();
    params.sort();
    let normalized = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        enc(base_url.as_str()),
        enc(&normalized)
    )
}
