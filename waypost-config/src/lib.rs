//! Loader for the bot configuration: embedded defaults, optional YAML file,
//! `WAYPOST__` environment overrides, and `${VAR}` expansion.
//!
//! Precedence, lowest first: `defaults.yaml` (compiled in), files/snippets in
//! the order they were added, then environment variables such as
//! `WAYPOST__SCHEDULE__RETRY_SECS=10`. After merging, `${VAR}` placeholders are
//! expanded recursively; a placeholder whose variable is unset becomes "absent"
//! so optional secrets deserialize to `None`.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use waypost_common::{DeploymentMode, Platform};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const DEFAULTS_YAML: &str = include_str!("defaults.yaml");
const LIST_KEYS: [&str; 2] = ["/reddit/subreddits", "/page/sentinel_titles"];
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; waypost)";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "WAYPOST_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct WaypostConfig {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub schedule: ScheduleConfig,
    pub discovery: DiscoveryConfig,
    pub reddit: RedditConfig,
    pub page: PageConfig,
    pub discussions: DiscussionsConfig,
    pub screenshot: ScreenshotConfig,
    pub twitter: TwitterConfig,
    pub mastodon: MastodonConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Production cadence, aligned to UTC hours divisible by this value.
    pub interval_hours: u32,
    /// A process started this many minutes into a slot runs right away.
    pub min_slack_minutes: u32,
    /// Pause after a failed run before trying again.
    pub retry_secs: u64,
    /// Rolling pause between successful runs in development mode.
    pub dev_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub timeout_secs: u64,
    pub weights: SourceWeights,
    pub stumbling_on_url: String,
    pub forest_link_url: String,
    pub wiby_url: String,
}

/// Relative pick weights; zero disables a source.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SourceWeights {
    pub stumbling_on: u32,
    pub forest_link: u32,
    pub wiby: u32,
    pub reddit: u32,
}

impl SourceWeights {
    pub fn total(&self) -> u64 {
        [self.stumbling_on, self.forest_link, self.wiby, self.reddit]
            .iter()
            .map(|w| u64::from(*w))
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub api_url: String,
    pub subreddits: Vec<String>,
    pub min_score: i64,
    pub min_comments: u64,
    pub attempts: u32,
    pub attempt_delay_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    pub timeout_secs: u64,
    /// Titles that mark a page as unusable (login walls and the like).
    pub sentinel_titles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionsConfig {
    pub base_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotConfig {
    pub base_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    pub full_page: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_secret: Option<String>,
    pub api_url: String,
    pub upload_url: String,
    /// Credit the page author (`by @handle`) in tweets.
    pub attribution: bool,
    pub timeout_secs: u64,
}

impl TwitterConfig {
    /// Names of the OAuth credentials that are unset or blank.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ]
        .into_iter()
        .filter(|(_, v)| is_blank(v))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MastodonConfig {
    pub instance_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Credit the page author (`by @handle`) in toots.
    pub attribution: bool,
    pub upload_timeout_secs: u64,
    pub post_timeout_secs: u64,
}

impl MastodonConfig {
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        if is_blank(&self.access_token) {
            vec!["access_token"]
        } else {
            Vec::new()
        }
    }
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

impl WaypostConfig {
    pub fn mode(&self) -> DeploymentMode {
        DeploymentMode::from_env_value(self.environment.as_deref().unwrap_or_default())
    }

    pub fn user_agent(&self) -> &str {
        match self.user_agent.as_deref().map(str::trim) {
            Some(ua) if !ua.is_empty() => ua,
            _ => DEFAULT_USER_AGENT,
        }
    }

    /// Whether posts for `platform` end with a `by @handle` line.
    pub fn attribution_for(&self, platform: Platform) -> bool {
        match platform {
            Platform::Twitter => self.twitter.attribution,
            Platform::Mastodon => self.mastodon.attribution,
        }
    }

    /// Reject values the scheduler or the source selector cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.schedule;
        if s.interval_hours == 0 || s.interval_hours > 24 {
            return Err(ConfigError::Message(format!(
                "schedule.interval_hours must be within 1..=24, got {}",
                s.interval_hours
            )));
        }
        if s.min_slack_minutes >= 60 {
            return Err(ConfigError::Message(
                "schedule.min_slack_minutes must be below 60".into(),
            ));
        }
        if s.retry_secs == 0 {
            return Err(ConfigError::Message("schedule.retry_secs must be positive".into()));
        }
        if self.discovery.weights.total() == 0 {
            return Err(ConfigError::Message(
                "discovery.weights must enable at least one source".into(),
            ));
        }
        if self.discovery.weights.reddit > 0 && self.reddit.subreddits.is_empty() {
            return Err(ConfigError::Message(
                "reddit.subreddits must not be empty while the reddit source is enabled".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `${NAME}` or `$NAME` with nothing else around it.
fn is_bare_placeholder(s: &str) -> bool {
    let name = s
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .or_else(|| s.strip_prefix('$'));
    match name {
        Some(name) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Environment overrides arrive as strings; comma-separated ones feed the
/// list settings. Everything else stays a string until typed deserialization,
/// so secrets such as "0012345" keep their leading zeros.
fn split_list_overrides(v: &mut Value) {
    for pointer in LIST_KEYS {
        if let Some(slot) = v.pointer_mut(pointer) {
            if let Value::String(raw) = slot {
                let items = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect();
                *slot = Value::Array(items);
            }
        }
    }
}

fn null_unresolved_placeholders(v: &mut Value) {
    match v {
        Value::String(s) if is_bare_placeholder(s) => *v = Value::Null,
        Value::Array(arr) => arr.iter_mut().for_each(null_unresolved_placeholders),
        Value::Object(obj) => obj.values_mut().for_each(null_unresolved_placeholders),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (defaults + files + env overrides).
pub struct WaypostConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for WaypostConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WaypostConfigLoader {
    /// Start from the compiled-in defaults.
    ///
    /// ```
    /// use waypost_config::WaypostConfigLoader;
    ///
    /// let config = WaypostConfigLoader::new().load().expect("defaults are valid");
    /// assert_eq!(config.schedule.interval_hours, 12);
    /// assert_eq!(config.discovery.weights.forest_link, 50);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(File::from_str(DEFAULTS_YAML, FileFormat::Yaml));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing, so headless deployments can rely on
    /// environment variables alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI).
    ///
    /// ```
    /// use waypost_config::WaypostConfigLoader;
    ///
    /// let cfg = WaypostConfigLoader::new()
    ///     .with_yaml_str("schedule:\n  retry_secs: 7\n")
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.schedule.retry_secs, 7);
    /// assert_eq!(cfg.schedule.interval_hours, 12);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use waypost_config::WaypostConfigLoader;
    ///
    /// unsafe { std::env::set_var("WAYPOST_DOC_TOKEN", "injected-from-env"); }
    ///
    /// let config = WaypostConfigLoader::new()
    ///     .with_yaml_str("mastodon:\n  access_token: \"${WAYPOST_DOC_TOKEN}\"\n")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.mastodon.access_token.as_deref(), Some("injected-from-env"));
    /// assert!(config.mastodon.missing_credentials().is_empty());
    ///
    /// unsafe { std::env::remove_var("WAYPOST_DOC_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<WaypostConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("WAYPOST").separator("__"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);
        null_unresolved_placeholders(&mut v);
        split_list_overrides(&mut v);

        // Re-enter the `config` deserializer so env strings like "10" still
        // coerce into numeric fields.
        let merged = serde_json::to_string(&v).map_err(|e| ConfigError::Message(e.to_string()))?;
        let typed: WaypostConfig = Config::builder()
            .add_source(File::from_str(&merged, FileFormat::Json))
            .build()?
            .try_deserialize()?;

        typed.validate()?;
        Ok(typed)
    }
}

/// Resolve the config file path: `WAYPOST_CONFIG` if set, else `waypost.yaml`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("waypost.yaml"))
}
