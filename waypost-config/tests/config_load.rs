use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use waypost_common::DeploymentMode;
use waypost_config::WaypostConfigLoader;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
environment: prod
schedule:
  interval_hours: 6
discovery:
  weights:
    stumbling_on: 10
    forest_link: 40
    wiby: 40
    reddit: 10
mastodon:
  instance_url: "https://example.social"
  access_token: "${WAYPOST_TEST_MASTODON_TOKEN}"
"#;
    let p = write_yaml(&tmp, "waypost.yaml", file_yaml);

    temp_env::with_var("WAYPOST_TEST_MASTODON_TOKEN", Some("tok-123"), || {
        let config = WaypostConfigLoader::new()
            .with_file(&p)
            .load()
            .expect("load system config");

        assert_eq!(config.mode(), DeploymentMode::Production);
        assert_eq!(config.schedule.interval_hours, 6);
        assert_eq!(config.schedule.retry_secs, 30);
        assert_eq!(config.discovery.weights.total(), 100);
        assert_eq!(config.mastodon.instance_url, "https://example.social");
        assert_eq!(config.mastodon.access_token.as_deref(), Some("tok-123"));
    });
}

#[test]
#[serial]
fn environment_overrides_beat_files() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "waypost.yaml", "schedule:\n  retry_secs: 90\n");

    temp_env::with_vars(
        [
            ("WAYPOST__SCHEDULE__RETRY_SECS", Some("15")),
            ("WAYPOST__REDDIT__SUBREDDITS", Some("InternetIsBeautiful,SideProject")),
            ("WAYPOST__TWITTER__ATTRIBUTION", Some("false")),
        ],
        || {
            let config = WaypostConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.schedule.retry_secs, 15);
            assert_eq!(
                config.reddit.subreddits,
                vec!["InternetIsBeautiful".to_string(), "SideProject".to_string()]
            );
            assert!(!config.twitter.attribution);
        },
    );
}

#[test]
#[serial]
fn numeric_looking_secret_overrides_stay_verbatim() {
    temp_env::with_vars(
        [
            ("WAYPOST__MASTODON__ACCESS_TOKEN", Some("0012345")),
            ("WAYPOST__DISCUSSIONS__ACCESS_TOKEN", Some("1e5")),
            ("WAYPOST__SCHEDULE__INTERVAL_HOURS", Some("8")),
        ],
        || {
            let config = WaypostConfigLoader::new().load().unwrap();
            assert_eq!(config.mastodon.access_token.as_deref(), Some("0012345"));
            assert_eq!(config.discussions.access_token.as_deref(), Some("1e5"));
            assert_eq!(config.schedule.interval_hours, 8);
        },
    );
}

#[test]
#[serial]
fn legacy_environment_variables_feed_the_defaults() {
    temp_env::with_vars(
        [
            ("APP_DEPLOYMENT_ENVIRONMENT", Some("prod")),
            ("USERAGENT", Some("waypost-test-agent")),
            ("TWITTER_CONSUMER_KEY", Some("ck")),
            ("TWITTER_CONSUMER_SECRET", Some("cs")),
            ("TWITTER_ACCESS_TOKEN", Some("at")),
            ("TWITTER_ACCESS_TOKEN_SECRET", None),
            ("MASTODON_BOT_ACCESS_TOKEN", None),
        ],
        || {
            let config = WaypostConfigLoader::new().load().unwrap();
            assert_eq!(config.mode(), DeploymentMode::Production);
            assert_eq!(config.user_agent(), "waypost-test-agent");
            assert_eq!(
                config.twitter.missing_credentials(),
                vec!["access_token_secret"]
            );
            assert_eq!(config.mastodon.access_token, None);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_is_fine() {
    temp_env::with_var("APP_DEPLOYMENT_ENVIRONMENT", None::<&str>, || {
        let config = WaypostConfigLoader::new()
            .with_optional_file("/definitely/not/here/waypost.yaml")
            .load()
            .unwrap();
        assert!(config.mode().is_dev());
    });
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    assert!(
        WaypostConfigLoader::new()
            .with_file("/definitely/not/here/waypost.yaml")
            .load()
            .is_err()
    );
}
