//! Common test helpers for integration tests.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{TestApp, create_activated_user};
//! ```
//!
//! # Note
//!
//! Each integration test file is compiled as a separate crate, so helpers
//! used by only some files would otherwise trigger dead code warnings.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::TimeDelta;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use notes_backend_api::api::{AppConfig, AppState, Environment, build_router};
use notes_backend_api::domain::{Note, PasswordHashString, TokenScope, User, UserId};
use notes_backend_api::infrastructure::{DEFAULT_QUERY_TIMEOUT, Repositories};

// =============================================================================
// AppState Creation Helpers
// =============================================================================

/// Creates a test `AppState` backed by in-memory repositories.
pub fn create_test_app_state() -> AppState {
    AppState::with_config(
        Repositories::in_memory(DEFAULT_QUERY_TIMEOUT),
        AppConfig {
            environment: Environment::Development,
        },
    )
}

/// A router and the state behind it, for driving requests end to end.
#[derive(Clone)]
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(create_test_app_state())
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Sends a request, optionally with a JSON body and a bearer token.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    /// Sends a pre-built request.
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, Some(body), token).await
    }

    pub async fn patch(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.send(Method::PATCH, uri, Some(body), token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, None, token).await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Stores a user directly, skipping password hashing.
pub async fn create_user(state: &AppState, email: &str, activated: bool) -> User {
    let mut user = User::new(
        "Test User",
        email,
        PasswordHashString::from_stored("not-a-real-hash".to_string()),
    );
    user.activated = activated;
    state.user_repository.insert(&mut user).await.unwrap();
    user
}

/// Issues an authentication token for `user_id`, returning the plaintext.
pub async fn issue_token(state: &AppState, user_id: UserId) -> String {
    state
        .token_repository
        .new_token(user_id, TimeDelta::hours(1), TokenScope::Authentication)
        .await
        .unwrap()
        .plaintext
}

/// An activated user and a valid bearer token for them.
pub async fn create_activated_user(state: &AppState, email: &str) -> (User, String) {
    let user = create_user(state, email, true).await;
    let token = issue_token(state, user.id).await;
    (user, token)
}

/// Stores a note, optionally authored by `author`.
pub async fn create_note(state: &AppState, title: &str, author: Option<UserId>) -> Note {
    let mut note = Note::new(title);
    note.author_id = author;
    state.note_repository.insert(&mut note).await.unwrap();
    note
}
