//! Authentication and the email confirmation redirect

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{request, TestApp, JWT_SECRET};
use jsonwebtoken::{encode, EncodingKey, Header};
use naturae_server::auth::Claims;

fn location(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app.send(request("GET", "/api/decks", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(request("GET", "/api/profile", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_rejected() {
    let app = TestApp::new().await;

    let expired = encode(
        &Header::default(),
        &Claims {
            sub: "alice".to_string(),
            email: None,
            exp: (chrono::Utc::now().timestamp() - 3600) as usize,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    let foreign = encode(
        &Header::default(),
        &Claims {
            sub: "alice".to_string(),
            email: None,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        },
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();

    for token in [expired, foreign] {
        let request = Request::builder()
            .uri("/api/decks")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_token_from_cookie() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri("/api/decks")
        .header(
            header::COOKIE,
            format!("theme=dark; naturae-access-token={}", common::token("alice")),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_confirm_without_token_redirects_to_login() {
    let app = TestApp::new().await;

    let response = app.send(request("GET", "/auth/confirm", None, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=missing_token");
}

#[tokio::test]
async fn test_confirm_forwards_provider_error() {
    let app = TestApp::new().await;

    let response = app
        .send(request(
            "GET",
            "/auth/confirm?error=access_denied&error_description=Email%20link%20is%20invalid",
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/login?error=confirmation_failed&message=Email+link+is+invalid"
    );
}

#[tokio::test]
async fn test_confirm_unreachable_provider_fails_softly() {
    let app = TestApp::new().await;

    let response = app
        .send(request("GET", "/auth/confirm?code=abc&next=/decks/1", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=confirmation_failed");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
