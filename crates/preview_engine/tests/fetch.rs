use std::time::Duration;

use pretty_assertions::assert_eq;
use preview_engine::{
    FetchFailureKind, FetchSettings, PreviewConfig, ProjectFetcher, ReqwestProjectFetcher,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetcher_for(server: &MockServer, settings: FetchSettings) -> ReqwestProjectFetcher {
    let endpoint = PreviewConfig::default()
        .with_backend_url(server.uri())
        .project_endpoint()
        .expect("valid endpoint");
    ReqwestProjectFetcher::new(endpoint, settings)
}

async fn mount_project(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/project"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_the_app_tree_on_success() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "app": {
                "index.html": "<h1>hi</h1>",
                "src": { "directory": { "main.js": { "file": { "contents": "1" } } } }
            }
        })),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let payload = fetcher.fetch().await.expect("fetch ok");

    assert_eq!(payload.tree().len(), 2);
    assert_eq!(payload.tree()["index.html"], json!("<h1>hi</h1>"));
}

#[tokio::test]
async fn success_false_is_not_found() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "success": false })),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::NotFound);
    assert_eq!(err.user_message(), "no project found");
}

#[tokio::test]
async fn success_without_app_is_not_found() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "app": null })),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn app_that_is_not_a_tree_is_a_parse_error() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "app": [1, 2] })),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::Parse);
    assert!(err
        .user_message()
        .starts_with("error while fetching the project data:"));
}

#[tokio::test]
async fn non_json_error_status_is_http_status() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(500).set_body_string("internal error"),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::HttpStatus(500));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn error_status_with_no_project_body_is_still_not_found() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(404).set_body_json(json!({ "success": false })),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::NotFound);
}

#[tokio::test]
async fn garbage_body_is_a_parse_error() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
    )
    .await;

    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::Parse);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    mount_project(
        &server,
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(250))
            .set_body_json(json!({ "success": true, "app": {} })),
    )
    .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = fetcher_for(&server, settings).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert_eq!(err.kind, FetchFailureKind::Timeout);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    let body = json!({ "success": true, "app": { "big.txt": "x".repeat(4096) } });
    mount_project(&server, ResponseTemplate::new(200).set_body_json(body)).await;

    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let fetcher = fetcher_for(&server, settings).await;
    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(
        err.kind,
        FetchFailureKind::TooLarge { max_bytes: 1024, .. }
    ));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let server = MockServer::start().await;
    let fetcher = fetcher_for(&server, FetchSettings::default()).await;
    drop(server);

    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(
        err.kind,
        FetchFailureKind::Network | FetchFailureKind::Timeout
    ));
}
