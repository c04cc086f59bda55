//! Everything a posting run learns from the open web.
//!
//! - Random-website discovery adapters and the weighted selector (`discovery`)
//! - Candidate page inspection: title, attribution handle, validity (`page`)
//! - Discussion aggregator lookup (`discussions`)
//! - Rendered screenshots from an external service (`screenshot`)
//!
//! Every call here degrades to "no data" on failure. Only the page inspector
//! reports an unusable candidate, and it does so through [`PageInfo::valid`].
//!
//! [`PageInfo::valid`]: waypost_common::PageInfo

use std::time::Duration;

use waypost_http::{HttpClient, HttpError};

pub mod discovery;
pub mod discussions;
pub mod page;
pub mod screenshot;

pub use discovery::{
    DiscoverySource, WeightedSelector, parse_meta_refresh,
    reddit::{RedditPost, RedditSource},
    sources::{ForestLinkSource, StumblingOnSource, WibySource},
};
pub use discussions::DiscussionLookup;
pub use page::{PageInspector, attribution_handle};
pub use screenshot::{ScreenshotClient, extension_for_mime};

/// Shared client construction: base URL, per-service timeout, bot user agent.
pub(crate) fn service_client(
    base: &str,
    timeout_secs: u64,
    user_agent: &str,
) -> Result<HttpClient, HttpError> {
    HttpClient::new(base)?
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_user_agent(user_agent)
}
