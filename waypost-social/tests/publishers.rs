use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use waypost_common::{Platform, Screenshot};
use waypost_social::oauth::OAuth1Credentials;
use waypost_social::{
    DryRunPublisher, MastodonPublisher, Publisher, PublisherSlot, SocialError, TwitterPublisher,
};
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "waypost-test";

fn screenshot() -> Screenshot {
    Screenshot {
        filename: "screenshot.png".into(),
        bytes: b"png-ish bytes".to_vec(),
        mime_type: "image/png".into(),
        description: "Screenshot of https://example.com taken with SpiderAPI".into(),
    }
}

fn mastodon(server: &MockServer) -> MastodonPublisher {
    MastodonPublisher::new(
        &server.uri(),
        "masto-token",
        Duration::from_secs(5),
        Duration::from_secs(5),
        UA,
    )
    .unwrap()
}

fn twitter(server: &MockServer) -> TwitterPublisher {
    TwitterPublisher::new(
        &server.uri(),
        &server.uri(),
        OAuth1Credentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            token: "at".into(),
            token_secret: "ats".into(),
        },
        Duration::from_secs(5),
        UA,
    )
    .unwrap()
}

#[tokio::test]
async fn mastodon_uploads_then_posts_with_media() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/media"))
        .and(header("authorization", "Bearer masto-token"))
        .and(body_string_contains("filename=\"screenshot.png\""))
        .and(body_string_contains("taken with SpiderAPI"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "777"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .and(header("authorization", "Bearer masto-token"))
        .and(body_string_contains("status=Hello"))
        .and(body_string_contains("media_ids%5B%5D=777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "109999"})))
        .expect(1)
        .mount(&server)
        .await;

    let shot = screenshot();
    let id = mastodon(&server).publish("Hello", Some(&shot)).await.unwrap();
    assert_eq!(id.as_deref(), Some("109999"));
}

#[tokio::test]
async fn mastodon_posts_without_media_when_upload_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/media"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "too big"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let shot = screenshot();
    let id = mastodon(&server).publish("Hello", Some(&shot)).await.unwrap();
    assert_eq!(id.as_deref(), Some("42"));

    let requests = server.received_requests().await.unwrap();
    let status_body = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/statuses")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .unwrap();
    assert!(!status_body.contains("media_ids"));
}

#[tokio::test]
async fn mastodon_rejection_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"error": "Validation failed"})),
        )
        .mount(&server)
        .await;

    let err = mastodon(&server).publish("Hello", None).await.unwrap_err();
    assert_eq!(err.status_and_reason(), (Some(422), "Unprocessable Entity"));
    assert!(err.to_string().contains("Validation failed"));
}

#[tokio::test]
async fn twitter_uploads_signed_media_then_tweets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1.1/media/upload.json"))
        .and(query_param("media_category", "tweet_image"))
        .and(header_regex("authorization", r#"^OAuth oauth_consumer_key="ck", .*oauth_signature="[^"]+""#))
        .and(body_string_contains("name=\"media\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"media_id": 710511363345354753u64, "media_id_string": "710511363345354753"}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header_regex("authorization", r#"^OAuth .*oauth_token="at""#))
        .and(body_json(json!({
            "text": "Hello",
            "media": {"media_ids": ["710511363345354753"]}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"data": {"id": "1445880548472328192", "text": "Hello"}}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let shot = screenshot();
    let id = twitter(&server).publish("Hello", Some(&shot)).await.unwrap();
    assert_eq!(id.as_deref(), Some("1445880548472328192"));
}

#[tokio::test]
async fn twitter_without_media_sends_text_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_json(json!({"text": "Just text"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "5"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = twitter(&server).publish("Just text", None).await.unwrap();
    assert_eq!(id.as_deref(), Some("5"));
}

#[tokio::test]
async fn twitter_errors_carry_the_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{"message": "You are not allowed to create a Tweet with duplicate content."}]
        })))
        .mount(&server)
        .await;

    let err = twitter(&server).publish("dup", None).await.unwrap_err();
    assert!(matches!(err, SocialError::Http(_)));
    assert_eq!(err.status_and_reason().0, Some(403));
    assert!(err.to_string().contains("duplicate content"));
}

#[tokio::test]
async fn one_failing_slot_does_not_stop_the_other() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "9"})))
        .expect(1)
        .mount(&server)
        .await;

    let tw = PublisherSlot::ready(Arc::new(twitter(&server)));
    let md = PublisherSlot::ready(Arc::new(mastodon(&server)));
    assert_eq!(tw.publish_isolated("Hello", None).await, None);
    assert_eq!(md.publish_isolated("Hello", None).await.as_deref(), Some("9"));
}

#[tokio::test]
async fn dry_run_never_touches_the_network() {
    let server = MockServer::start().await;
    let publisher = DryRunPublisher::new(Platform::Twitter);
    let shot = screenshot();

    let id = publisher.publish("Hello", Some(&shot)).await.unwrap().unwrap();
    assert!(id.parse::<u32>().is_ok());
    assert_eq!(publisher.platform(), Platform::Twitter);
    assert!(server.received_requests().await.unwrap().is_empty());
}
