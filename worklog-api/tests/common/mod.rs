/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An app wired to the in-memory backend (no external services)
/// - Account creation and sign-in
/// - Request and multipart body helpers

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use worklog_api::app::{build_router, AppState, Backend};
use worklog_api::config::Config;
use worklog_shared::backend::memory::{MemoryIdentity, MemoryStorage, MemoryTaskStore};
use worklog_shared::backend::{Credentials, IdentityProvider};
use worklog_shared::events::ChangeHub;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const TEST_PASSWORD: &str = "secret1";
pub const BOUNDARY: &str = "worklog-test-boundary";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub identity: Arc<MemoryIdentity>,
    pub storage: Arc<MemoryStorage>,
    pub tasks: Arc<MemoryTaskStore>,
    pub changes: ChangeHub,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_identity(MemoryIdentity::new(TEST_SECRET))
    }

    pub fn with_identity(identity: MemoryIdentity) -> Self {
        let config = Config::memory(TEST_SECRET);
        let changes = ChangeHub::default();

        let identity = Arc::new(identity);
        let storage = Arc::new(MemoryStorage::new());
        let tasks = Arc::new(MemoryTaskStore::with_hub(changes.clone()));

        let backend = Backend {
            identity: identity.clone(),
            storage: storage.clone(),
            tasks: tasks.clone(),
        };
        let app = build_router(AppState::new(config, backend, changes.clone(), None));

        Self {
            app,
            identity,
            storage,
            tasks,
            changes,
        }
    }

    /// Registers `email` and returns a fresh access token
    pub async fn sign_in(&self, email: &str) -> String {
        let credentials = Credentials::new(email, TEST_PASSWORD);
        self.identity.sign_up(&credentials, None).await.unwrap();
        self.identity.sign_in(&credentials).await.unwrap().access_token
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

/// One multipart part: name, optional file name and content
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).into_owned()
}

pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
