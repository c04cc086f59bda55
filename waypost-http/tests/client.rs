use std::borrow::Cow;
use std::time::Duration;

use serde_json::{Value, json};
use waypost_http::{Auth, HttpClient, HttpError, Part, RequestOpts};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&server.uri())
        .expect("mock base url")
        .with_timeout(Duration::from_secs(5))
        .with_retries(0)
}

#[tokio::test]
async fn get_json_sends_bearer_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/screenshot"))
        .and(query_param("url", "https://example.com"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let got: Value = client_for(&server)
        .get_json(
            "api/v0/screenshot",
            RequestOpts {
                auth: Some(Auth::Bearer(" abc ")),
                query: Some(vec![("url", Cow::Borrowed("https://example.com"))]),
                ..Default::default()
            },
        )
        .await
        .expect("json response");

    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn user_agent_is_applied_to_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "waypost-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>hi</title>"))
        .mount(&server)
        .await;

    let text = client_for(&server)
        .with_user_agent("waypost-test/1.0")
        .unwrap()
        .get_text("page", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(text, "<title>hi</title>");
}

#[tokio::test]
async fn absolute_urls_bypass_the_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = HttpClient::new("https://unused.invalid").unwrap().with_retries(0);
    let text = client
        .get_text(
            &format!("{}/elsewhere", server.uri()),
            RequestOpts {
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn non_success_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"error": "Text can't be blank"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .post_form_json::<Value>(
            "api/v1/statuses",
            vec![("status", Cow::Borrowed(""))],
            RequestOpts::default(),
        )
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 422);
            assert_eq!(message, "Text can't be blank");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "x"})))
        .mount(&server)
        .await;

    let got: Value = client_for(&server)
        .with_retries(1)
        .get_json("flaky", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(got["content"], "x");
}

#[tokio::test]
async fn form_and_multipart_bodies_are_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string_contains("media_ids%5B%5D=42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"screenshot.png\""))
        .and(body_string_contains("a screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "2"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let form: Value = client
        .post_form_json(
            "form",
            vec![
                ("status", Cow::Borrowed("hello")),
                ("media_ids[]", Cow::Borrowed("42")),
            ],
            RequestOpts::default(),
        )
        .await
        .unwrap();
    assert_eq!(form["id"], "1");

    let upload: Value = client
        .post_multipart_json(
            "upload",
            vec![
                Part::File {
                    name: "file",
                    filename: "screenshot.png",
                    mime: "image/png",
                    bytes: b"not-really-a-png",
                },
                Part::Text {
                    name: "description",
                    value: Cow::Borrowed("a screenshot"),
                },
            ],
            RequestOpts::default(),
        )
        .await
        .unwrap();
    assert_eq!(upload["id"], "2");
}

#[tokio::test]
async fn decode_failures_carry_a_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_json::<Value>("html", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snip) if snip == "<html>"));
}
