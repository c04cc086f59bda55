//! Common types and utilities shared across Waypost crates.
//!
//! This crate defines the per-run domain values that flow through the posting
//! pipeline, the deployment mode switch and observability helpers. It stays
//! dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`DeploymentMode`]: production vs. development (dry-run) behaviour
//! - [`PageInfo`], [`DiscussionInfo`], [`Screenshot`]: transient pipeline values
//! - [`Platform`]: the two microblogs a run publishes to
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use waypost_common::{DeploymentMode, PageInfo};
//!
//! assert_eq!(DeploymentMode::from_env_value("PROD"), DeploymentMode::Production);
//! assert!(DeploymentMode::from_env_value("").is_dev());
//! assert!(!PageInfo::invalid().valid);
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Whether the bot talks to real platforms or only logs what it would post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Production,
    #[default]
    Development,
}

impl DeploymentMode {
    /// Only the literal `prod` (any case) selects production.
    pub fn from_env_value(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("prod") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_dev(self) -> bool {
        self == Self::Development
    }
}

/// Target platforms for a published status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Mastodon,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Mastodon => "mastodon",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page inspector learned about a candidate URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub title: String,
    pub attributed_handle: Option<String>,
    /// `false` aborts the run.
    pub valid: bool,
}

impl PageInfo {
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Enrichment from the discussion aggregator. Both fields are independent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscussionInfo {
    pub discussions_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A rendered screenshot, discarded once both platforms have been attempted.
#[derive(Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub description: String,
}

impl std::fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screenshot")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_prod_is_production() {
        assert_eq!(DeploymentMode::from_env_value("prod"), DeploymentMode::Production);
        assert_eq!(DeploymentMode::from_env_value(" Prod "), DeploymentMode::Production);
        assert_eq!(DeploymentMode::from_env_value("production"), DeploymentMode::Development);
        assert_eq!(DeploymentMode::from_env_value("staging"), DeploymentMode::Development);
    }

    #[test]
    fn deployment_mode_deserializes_lowercase() {
        let mode: DeploymentMode = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(mode, DeploymentMode::Production);
    }

    #[test]
    fn screenshot_debug_hides_payload() {
        let shot = Screenshot {
            filename: "screenshot.png".into(),
            bytes: vec![0u8; 2048],
            mime_type: "image/png".into(),
            description: "d".into(),
        };
        let rendered = format!("{shot:?}");
        assert!(rendered.contains("2048"));
        assert!(rendered.len() < 200);
    }
}
