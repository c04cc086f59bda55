//! Turning an enriched candidate into posts.
//!
//! - [`status`]: deterministic post text composition
//! - [`oauth`]: OAuth 1.0a HMAC-SHA1 signing for Twitter/X
//! - [`Publisher`] with Twitter/X, Mastodon and dry-run implementations
//! - [`PublisherSlot`]: per-platform isolation so one platform's failure never
//!   stops the other
pub mod dry_run;
pub mod mastodon;
pub mod oauth;
mod publisher;
pub mod status;
pub mod twitter;

pub use dry_run::DryRunPublisher;
pub use mastodon::MastodonPublisher;
pub use publisher::{Publisher, PublisherSlot, SocialError};
pub use status::{StatusParts, build_status, hashtags, truncate_title};
pub use twitter::TwitterPublisher;

use serde_json::Value;

/// Platforms report ids as strings or numbers depending on the endpoint.
pub(crate) fn json_id(v: &Value, pointer: &str) -> Option<String> {
    match v.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
