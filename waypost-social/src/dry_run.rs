use async_trait::async_trait;
use rand::Rng;
use tracing::info;
use waypost_common::{Platform, Screenshot};

use crate::{Publisher, SocialError};

/// Development stand-in: logs the post and invents an id. No network I/O.
#[derive(Debug, Clone)]
pub struct DryRunPublisher {
    platform: Platform,
}

impl DryRunPublisher {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn kind(&self) -> &'static str {
        "dry-run"
    }

    async fn publish(
        &self,
        status: &str,
        media: Option<&Screenshot>,
    ) -> Result<Option<String>, SocialError> {
        let id: u32 = rand::thread_rng().gen_range(1..=1_000_000);
        info!(
            platform = %self.platform,
            id,
            media = ?media.map(|m| m.filename.as_str()),
            text = %status,
            "publish.dry_run"
        );
        Ok(Some(id.to_string()))
    }
}
