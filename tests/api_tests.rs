//! HTTP API tests driven through the router without binding a socket.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use vidarr::config::Config;
use vidarr::state::AppState;

fn test_config() -> Config {
    let scratch = std::env::temp_dir().join(format!("vidarr-api-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.data_dir = scratch.join("data").to_string_lossy().to_string();
    config.downloads.directory = scratch.join("downloads").to_string_lossy().to_string();
    config.downloads.tick_seconds = 1;
    config
}

async fn spawn_app() -> Router {
    let (state, engine) = AppState::build(test_config()).expect("failed to build app state");
    tokio::spawn(engine.run());
    vidarr::api::router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Minimal enqueue payload pointing at a link no test will ever reach.
fn enqueue_payload(title: &str) -> serde_json::Value {
    serde_json::json!({
        "content_id": "603",
        "title": title,
        "media_type": "movie",
        "link": {
            "url": "http://127.0.0.1:9/unreachable.mp4",
            "kind": "direct"
        }
    })
}

#[tokio::test]
async fn providers_can_be_listed_and_switched() {
    let app = spawn_app().await;

    let response = app.clone().oneshot(get("/api/providers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["active"], "tmdb");
    let available: Vec<&str> = json["data"]["available"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(available.contains(&"tmdb"));
    assert!(available.contains(&"streamvault"));

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/providers/active",
            &serde_json::json!({ "name": "streamvault" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/api/providers")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["active"], "streamvault");
}

#[tokio::test]
async fn switching_to_an_unknown_provider_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/providers/active",
            &serde_json::json!({ "name": "bogus" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("unknown provider"));
}

#[tokio::test]
async fn enqueue_rejects_blank_fields() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/downloads", &enqueue_payload("  ")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut payload = enqueue_payload("The Matrix");
    payload["link"]["url"] = serde_json::json!("");
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/downloads", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_records_flow_through_the_api() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/downloads",
            &enqueue_payload("The Matrix"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let id = json["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["data"]["state"], "pending");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/downloads/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "The Matrix");

    let response = app.clone().oneshot(get("/api/downloads")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get("/api/downloads/queue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["queued"].is_array());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/downloads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/downloads/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_download_ids_return_not_found() {
    let app = spawn_app().await;

    for request in [
        get("/api/downloads/no-such-id"),
        Request::builder()
            .method("POST")
            .uri("/api/downloads/no-such-id/pause")
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri("/api/downloads/no-such-id/convert")
            .body(Body::empty())
            .unwrap(),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }
}

#[tokio::test]
async fn convert_rejects_downloads_that_are_not_completed() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/downloads",
            &enqueue_payload("Queued Item"),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/downloads/{id}/convert"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("completed"));
}

#[tokio::test]
async fn file_path_updates_are_validated_and_applied() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/downloads",
            &enqueue_payload("Moved Item"),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    let id = json["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/downloads/{id}/path"),
            &serde_json::json!({ "path": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/downloads/{id}/path"),
            &serde_json::json!({ "path": "/media/library/moved.mp4" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/downloads/{id}")))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["local_path"], "/media/library/moved.mp4");
}

#[tokio::test]
async fn search_requires_a_query() {
    let app = spawn_app().await;

    let response = app.clone().oneshot(get("/api/search?q=%20")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_media_types_are_rejected() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get("/api/content/music/123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_endpoint_serves_an_event_stream() {
    let app = spawn_app().await;

    let response = app.clone().oneshot(get("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with(mime::TEXT_EVENT_STREAM.as_ref()));
}
