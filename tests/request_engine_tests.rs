//! Retry behavior of the request engine, exercised against a local server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use vidarr::config::NetworkConfig;
use vidarr::errors::NetworkError;
use vidarr::net::{Endpoint, RequestEngine, build_shared_http_client};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn engine(max_retry_attempts: u32) -> RequestEngine {
    let network = NetworkConfig {
        timeout_seconds: 5,
        max_retry_attempts,
        retry_delay_ms: 10,
        ..NetworkConfig::default()
    };
    RequestEngine::new(build_shared_http_client(&network).unwrap(), &network)
}

/// Routes every request to `handler` and counts how often it was hit.
fn counting_app<H, R>(hits: Arc<AtomicUsize>, handler: H) -> Router
where
    H: Fn(usize) -> R + Clone + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
{
    Router::new().route(
        "/endpoint",
        get(move || {
            let hits = Arc::clone(&hits);
            let handler = handler.clone();
            async move {
                let attempt = hits.fetch_add(1, Ordering::SeqCst);
                handler(attempt)
            }
        }),
    )
}

#[tokio::test]
async fn client_errors_fail_on_the_first_attempt() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&hits), |_| StatusCode::NOT_FOUND);
    let addr = serve(app).await;

    let err = engine(3)
        .execute(&Endpoint::get(format!("http://{addr}"), "/endpoint"))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::HttpStatus(404)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_bound() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&hits), |_| StatusCode::INTERNAL_SERVER_ERROR);
    let addr = serve(app).await;

    let err = engine(3)
        .execute(&Endpoint::get(format!("http://{addr}"), "/endpoint"))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::HttpStatus(500)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn transient_server_errors_recover_within_the_budget() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&hits), |attempt| {
        if attempt < 2 {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
        } else {
            (StatusCode::OK, "recovered").into_response()
        }
    });
    let addr = serve(app).await;

    let body = engine(3)
        .execute(&Endpoint::get(format!("http://{addr}"), "/endpoint"))
        .await
        .unwrap();

    assert_eq!(body, "recovered");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn decode_failures_are_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&hits), |_| (StatusCode::OK, "not json"));
    let addr = serve(app).await;

    let err = engine(3)
        .execute_json::<serde_json::Value>(&Endpoint::get(format!("http://{addr}"), "/endpoint"))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::Decode(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn post_bodies_reach_the_server_as_json() {
    let app = Router::new().route(
        "/endpoint",
        post(|Json(body): Json<serde_json::Value>| async move {
            Json(serde_json::json!({ "got": body["name"] }))
        }),
    );
    let addr = serve(app).await;

    let endpoint = Endpoint::post(format!("http://{addr}"), "/endpoint")
        .with_json_body(serde_json::json!({ "name": "streamvault" }));
    let reply: serde_json::Value = engine(1).execute_json(&endpoint).await.unwrap();

    assert_eq!(reply["got"], "streamvault");
}

#[tokio::test]
async fn connection_failures_count_as_retryable() {
    // Port 9 (discard) is reliably closed on loopback.
    let err = engine(2)
        .execute(&Endpoint::get("http://127.0.0.1:9", "/endpoint"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
}
