//! Authentication token issuance.

use axum::{Json, extract::State, http::StatusCode};
use chrono::TimeDelta;

use super::dto::{AuthenticationTokenEnvelope, CreateAuthenticationTokenRequest, JsonBody};
use super::error::ApiErrorResponse;
use super::handlers::AppState;
use crate::domain::{
    PasswordHashString, TokenScope, Validator, validate_email, validate_password_plaintext,
};
use crate::infrastructure::RepositoryError;

/// Hours an authentication token stays valid.
pub const AUTHENTICATION_TOKEN_TTL_HOURS: i64 = 24;

async fn verify_password(
    hash: PasswordHashString,
    password: String,
) -> Result<bool, ApiErrorResponse> {
    tokio::task::spawn_blocking(move || hash.matches(&password))
        .await
        .map_err(|error| ApiErrorResponse::internal_error(&error))
}

/// `POST /v{1,2}/tokens/authentication`
///
/// # Request Body
///
/// ```json
/// {"email": "alice@example.com", "password": "pa55word"}
/// ```
///
/// # Response
///
/// - **201 Created** with `{"authentication_token": {"token": ..., "expiry": ...}}`
/// - **401 Unauthorized**: unknown email or wrong password
/// - **422 Unprocessable Entity**: malformed email or password
///
/// # Errors
///
/// See above; store failures are 500.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateAuthenticationTokenRequest>,
) -> Result<(StatusCode, Json<AuthenticationTokenEnvelope>), ApiErrorResponse> {
    let mut validator = Validator::new();
    validate_email(&mut validator, &request.email);
    validate_password_plaintext(&mut validator, &request.password);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let user = match state.user_repository.get_by_email(&request.email).await {
        Ok(user) => user,
        Err(RepositoryError::RecordNotFound) => {
            return Err(ApiErrorResponse::invalid_credentials());
        }
        Err(error) => return Err(error.into()),
    };

    if !verify_password(user.password_hash.clone(), request.password).await? {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(ApiErrorResponse::invalid_credentials());
    }

    let token = state
        .token_repository
        .new_token(
            user.id,
            TimeDelta::hours(AUTHENTICATION_TOKEN_TTL_HOURS),
            TokenScope::Authentication,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthenticationTokenEnvelope {
            authentication_token: token,
        }),
    ))
}
