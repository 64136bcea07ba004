//! Request authentication.
//!
//! `authenticate` runs on every route and places a [`Principal`] in the
//! request extensions. `require_activated_user` guards the `/v2/notes`
//! routes: only an authenticated, activated user reaches those handlers,
//! and they receive it through the [`ActivatedUser`] extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::error::ApiErrorResponse;
use super::handlers::AppState;
use crate::domain::{TokenScope, User, Validator, validate_token_plaintext};
use crate::infrastructure::RepositoryError;

/// The identity making a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    User(Box<User>),
}

/// An authenticated user whose account is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedUser(pub User);

impl<S> FromRequestParts<S> for ActivatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(ApiErrorResponse::authentication_required)
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Resolves the bearer token, if any, into a [`Principal`].
///
/// No `Authorization` header yields `Principal::Anonymous`. A malformed
/// header or an unknown or expired token is rejected with 401.
///
/// # Errors
///
/// Returns the 401 envelope for bad tokens, 500 if the store fails.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiErrorResponse> {
    let principal = resolve_principal(&state, request.headers()).await?;
    request.extensions_mut().insert(principal);

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    Ok(response)
}

/// Admits only activated users, exposing them as [`ActivatedUser`].
///
/// # Errors
///
/// 401 for anonymous requests, 403 for unactivated accounts. The inner
/// handler is not invoked in either case.
pub async fn require_activated_user(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiErrorResponse> {
    let user = match request.extensions().get::<Principal>() {
        Some(Principal::User(user)) => user.as_ref().clone(),
        Some(Principal::Anonymous) | None => {
            return Err(ApiErrorResponse::authentication_required());
        }
    };

    if !user.activated {
        tracing::debug!(user_id = %user.id, "rejecting unactivated user");
        return Err(ApiErrorResponse::inactive_account());
    }

    request.extensions_mut().insert(ActivatedUser(user));
    Ok(next.run(request).await)
}

async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Principal, ApiErrorResponse> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Principal::Anonymous);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(ApiErrorResponse::invalid_authentication_token)?;

    let mut validator = Validator::new();
    validate_token_plaintext(&mut validator, token);
    if !validator.valid() {
        return Err(ApiErrorResponse::invalid_authentication_token());
    }

    match state
        .user_repository
        .get_for_token(TokenScope::Authentication, token)
        .await
    {
        Ok(user) => Ok(Principal::User(Box::new(user))),
        Err(RepositoryError::RecordNotFound) => {
            Err(ApiErrorResponse::invalid_authentication_token())
        }
        Err(error) => Err(error.into()),
    }
}

/// Extracts the token from `Bearer <token>`.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}
