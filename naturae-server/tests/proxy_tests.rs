//! Input validation of the external proxies
//!
//! Every request here is rejected before any upstream call, so the tests
//! run without network access.

mod common;

use axum::http::StatusCode;
use common::{json_body, request, TestApp};

#[tokio::test]
async fn test_image_proxy_requires_url() {
    let app = TestApp::new().await;

    let response = app.send(request("GET", "/api/image-proxy", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(request("GET", "/api/image-proxy?url=not%20a%20url", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(request(
            "GET",
            "/api/image-proxy?url=ftp%3A%2F%2Fobservation.org%2Fphoto.jpg",
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_proxy_rejects_foreign_host() {
    let app = TestApp::new().await;

    for url in [
        "https%3A%2F%2Fevil.example.com%2Fphoto.jpg",
        "https%3A%2F%2Fobservation.org.evil.example.com%2Fphoto.jpg",
        "http%3A%2F%2F127.0.0.1%2Fadmin",
    ] {
        let response = app
            .send(request("GET", &format!("/api/image-proxy?url={}", url), None, None))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "url {}", url);
        assert_eq!(json_body(response).await["error"]["code"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn test_xeno_canto_stream_requires_numeric_id() {
    let app = TestApp::new().await;

    let response = app
        .send(request("GET", "/api/xeno-canto/stream/abc123", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_xeno_canto_audio_requires_name() {
    let app = TestApp::new().await;

    let response = app.send(request("GET", "/api/xeno-canto/audio", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wikipedia_rejects_bad_language() {
    let app = TestApp::new().await;

    let response = app
        .send(request("GET", "/api/wikipedia/Merel?lang=en.evil", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gbif_media_requires_numeric_taxon_key() {
    let app = TestApp::new().await;

    let response = app.send(request("GET", "/api/gbif/media", None, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(request("GET", "/api/gbif/media?taxonKey=merel", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
