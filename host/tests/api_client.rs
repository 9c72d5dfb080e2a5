//! ApiClient against an in-process fixture server.

use std::time::Duration;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use solvex_host::api::ApiClient;
use solvex_host::config::{ApiConfig, EndpointsConfig};
use solvex_host::error::FetchError;
use solvex_host::poller::{PollConfig, Poller};
use solvex_host::source::InspectionSource;
use tokio::net::TcpListener;

async fn spawn_fixture(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url,
        timeout_ms: 2000,
        endpoints: EndpointsConfig::default(),
    })
    .unwrap()
}

fn inspection_api() -> Router {
    Router::new()
        .route(
            "/api/sensores/ultimo",
            get(|| async {
                Json(json!({
                    "humidity": 30.58,
                    "temperature": 28,
                    "luminosity": 120,
                    "passed": false,
                    "confidence": 0.42,
                    "captured_at": "2025-01-01T00:00:00Z"
                }))
            }),
        )
        .route("/api/inspeccion/imagen", get(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/api/sensores",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route("/api/inspeccion/advertencia", get(|| async { "<html>oops</html>" }))
}

#[tokio::test]
async fn decodes_latest_reading() {
    let api = client(spawn_fixture(inspection_api()).await);

    let reading = api.latest_reading().await.unwrap().unwrap();

    assert_eq!(reading.temperature, 28.0);
    assert_eq!(reading.luminosity, 120.0);
    assert!(!reading.passed);
    assert_eq!(reading.confidence, Some(0.42));
}

#[tokio::test]
async fn no_content_means_no_data_yet() {
    let api = client(spawn_fixture(inspection_api()).await);

    assert_eq!(api.latest_image().await, Ok(None));
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let api = client(spawn_fixture(inspection_api()).await);

    assert_eq!(
        api.history().await,
        Err(FetchError::Status { status: 500 })
    );
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let api = client(spawn_fixture(inspection_api()).await);

    assert!(matches!(
        api.advisory().await,
        Err(FetchError::Decode { .. })
    ));
}

#[tokio::test]
async fn image_without_timestamp_is_accepted() {
    let app = Router::new().route(
        "/api/inspeccion/imagen",
        get(|| async {
            Json(json!({
                "url": "https://cdn.test/inspeccion/41.jpg",
                "prediction": "ok",
                "confidence": 0.9
            }))
        }),
    );
    let api = client(spawn_fixture(app).await);
    let before = chrono::Utc::now();

    let capture = api.latest_image().await.unwrap().unwrap();

    assert_eq!(capture.url, "https://cdn.test/inspeccion/41.jpg");
    assert_eq!(capture.prediction.as_deref(), Some("ok"));
    assert!(capture.captured_at >= before);
}

#[tokio::test]
async fn previous_reading_uses_its_own_endpoint() {
    let app = Router::new()
        .route("/api/sensores/ultimo", get(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/api/sensores/penultimo",
            get(|| async {
                Json(json!({
                    "humidity": 31.2,
                    "temperature": 27.5,
                    "luminosity": 118,
                    "passed": true,
                    "captured_at": "2024-12-31T23:59:45Z"
                }))
            }),
        );
    let api = client(spawn_fixture(app).await);

    let previous = api.previous_reading().await.unwrap().unwrap();

    assert_eq!(previous.temperature, 27.5);
    assert_eq!(api.latest_reading().await, Ok(None));
}

#[tokio::test]
async fn history_no_content_is_empty() {
    let app = Router::new().route("/api/sensores", get(|| async { StatusCode::NO_CONTENT }));
    let api = client(spawn_fixture(app).await);

    assert_eq!(api.history().await, Ok(Vec::new()));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(format!("http://{}", addr));

    assert!(matches!(
        api.latest_reading().await,
        Err(FetchError::Transport { .. })
    ));
}

#[tokio::test]
async fn poller_surfaces_http_failure_as_failure_state() {
    let api = client(spawn_fixture(inspection_api()).await);

    let poller = Poller::start(PollConfig::new("history", 60_000), move || {
        let api = api.clone();
        async move { api.history().await }
    })
    .unwrap();

    for _ in 0..200 {
        if poller.fetch_state().error().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(poller.fetch_state().error(), Some("HTTP 500"));
    poller.stop();
}
