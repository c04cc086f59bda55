//! Random-website discovery.
//!
//! A [`WeightedSelector`] holds every configured adapter with an integer
//! weight and asks exactly one of them for a candidate per run. Adapters never
//! fail loudly: any transport error, non-success status or missing field turns
//! into `None` plus a `warn!` event.

use async_trait::async_trait;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use tracing::{debug, info, warn};
use waypost_config::WaypostConfig;
use waypost_http::HttpError;

pub mod reddit;
pub mod sources;

pub use sources::parse_meta_refresh;

use reddit::RedditSource;
use sources::{ForestLinkSource, StumblingOnSource, WibySource};

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// A candidate URL, or `None` when the service had nothing usable.
    async fn candidate(&self) -> Option<String>;
}

struct Weighted {
    source: Box<dyn DiscoverySource>,
    weight: u32,
}

/// Picks one adapter per run, proportionally to its weight.
#[derive(Default)]
pub struct WeightedSelector {
    sources: Vec<Weighted>,
}

impl WeightedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S>(mut self, source: S, weight: u32) -> Self
    where
        S: DiscoverySource + 'static,
    {
        self.sources.push(Weighted {
            source: Box::new(source),
            weight,
        });
        self
    }

    /// The four built-in adapters with the configured weights.
    pub fn from_config(config: &WaypostConfig) -> Result<Self, HttpError> {
        let d = &config.discovery;
        let ua = config.user_agent();
        Ok(Self::new()
            .with_source(
                StumblingOnSource::new(&d.stumbling_on_url, d.timeout_secs, ua)?,
                d.weights.stumbling_on,
            )
            .with_source(
                ForestLinkSource::new(&d.forest_link_url, d.timeout_secs, ua)?,
                d.weights.forest_link,
            )
            .with_source(
                WibySource::new(&d.wiby_url, d.timeout_secs, ua)?,
                d.weights.wiby,
            )
            .with_source(
                RedditSource::from_config(&config.reddit, ua)?,
                d.weights.reddit,
            ))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Weighted draw. `None` when there are no sources or every weight is zero.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&dyn DiscoverySource> {
        let dist = WeightedIndex::new(self.sources.iter().map(|w| w.weight)).ok()?;
        self.sources
            .get(dist.sample(rng))
            .map(|w| w.source.as_ref())
    }

    /// Ask one randomly chosen adapter for a candidate.
    pub async fn discover(&self) -> Option<String> {
        let source = {
            let mut rng = rand::thread_rng();
            self.pick(&mut rng)
        };
        let Some(source) = source else {
            warn!("discovery.no_source_enabled");
            return None;
        };

        debug!(source = source.name(), "discovery.start");
        let candidate = source.candidate().await;
        match &candidate {
            Some(url) => info!(source = source.name(), %url, "discovery.candidate"),
            None => warn!(source = source.name(), "discovery.empty"),
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Fixed(&'static str, Option<&'static str>);

    #[async_trait]
    impl DiscoverySource for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn candidate(&self) -> Option<String> {
            self.1.map(str::to_string)
        }
    }

    #[test]
    fn zero_weight_sources_are_never_picked() {
        let selector = WeightedSelector::new()
            .with_source(Fixed("off", None), 0)
            .with_source(Fixed("on", Some("https://example.com")), 5)
            .with_source(Fixed("also-off", None), 0);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(selector.pick(&mut rng).map(|s| s.name()), Some("on"));
        }
    }

    #[test]
    fn all_zero_or_empty_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(WeightedSelector::new().pick(&mut rng).is_none());

        let selector = WeightedSelector::new().with_source(Fixed("off", None), 0);
        assert!(selector.pick(&mut rng).is_none());
    }

    #[test]
    fn picks_roughly_follow_weights() {
        let selector = WeightedSelector::new()
            .with_source(Fixed("heavy", None), 90)
            .with_source(Fixed("light", None), 10);

        let mut rng = StdRng::seed_from_u64(42);
        let heavy = (0..1000)
            .filter(|_| selector.pick(&mut rng).map(|s| s.name()) == Some("heavy"))
            .count();
        assert!((800..=980).contains(&heavy), "heavy picked {heavy} times");
    }

    #[tokio::test]
    async fn discover_returns_the_chosen_sources_candidate() {
        let selector =
            WeightedSelector::new().with_source(Fixed("only", Some("https://example.org")), 1);
        assert_eq!(
            selector.discover().await.as_deref(),
            Some("https://example.org")
        );
    }

    #[tokio::test]
    async fn discover_passes_through_an_empty_source() {
        let selector = WeightedSelector::new().with_source(Fixed("dead", None), 1);
        assert_eq!(selector.discover().await, None);
    }
}
