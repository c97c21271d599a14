//! Shared helpers for naturae-server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use naturae_common::config::{Settings, TomlConfig};
use naturae_common::db::init_database;
use naturae_server::auth::Claims;
use naturae_server::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-for-naturae";

/// Router over a fresh database in a temporary root folder
pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub settings: Settings,
    // Dropped last: removes the root folder
    _root: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(|_| {}).await
    }

    /// Build the app after adjusting the default settings
    pub async fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let root = TempDir::new().unwrap();
        let mut settings = Settings::from_parts(root.path().to_path_buf(), Some(0), TomlConfig::default());
        settings.jwt_secret = JWT_SECRET.to_string();
        // Closed port: provider calls fail fast without network access
        settings.auth.url = "http://127.0.0.1:9".to_string();
        adjust(&mut settings);
        settings.ensure_directories().unwrap();

        let db = init_database(&settings.db_path).await.unwrap();
        let state = AppState::new(db.clone(), settings.clone()).unwrap();

        Self {
            router: build_router(state),
            db,
            settings,
            _root: root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Signed access token for `user_id`, valid for ten minutes
pub fn token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        exp: (chrono::Utc::now().timestamp() + 600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Request with an optional bearer token and JSON body
pub fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request with a raw byte body, as used for uploads
pub fn upload(uri: &str, user: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user)))
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(bytes))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Create a deck through the API and return its id
pub async fn create_deck(app: &TestApp, user: &str, title: &str, is_public: bool) -> String {
    let response = app
        .send(request(
            "POST",
            "/api/decks",
            Some(user),
            Some(serde_json::json!({ "title": title, "is_public": is_public })),
        ))
        .await;
    assert_eq!(response.status(), 201);
    json_body(response).await["id"].as_str().unwrap().to_string()
}

/// Add a card through the API and return its id
pub async fn create_card(app: &TestApp, user: &str, deck_id: &str, front: &str, back: &str) -> String {
    let response = app
        .send(request(
            "POST",
            &format!("/api/decks/{}/cards", deck_id),
            Some(user),
            Some(serde_json::json!({ "front_text": front, "back_text": back })),
        ))
        .await;
    assert_eq!(response.status(), 201);
    json_body(response).await["id"].as_str().unwrap().to_string()
}
