//! User registration and activation.

use axum::{Json, extract::State, http::StatusCode};
use chrono::TimeDelta;

use super::dto::{ActivateUserRequest, JsonBody, RegisterUserRequest, UserEnvelope};
use super::error::ApiErrorResponse;
use super::handlers::AppState;
use crate::domain::{
    PasswordHashString, TokenScope, User, Validator, validate_token_plaintext, validate_user,
};
use crate::infrastructure::RepositoryError;

/// Days an activation token stays valid.
pub const ACTIVATION_TOKEN_TTL_DAYS: i64 = 3;

/// Hashes a password on the blocking thread pool.
async fn hash_password(password: String) -> Result<PasswordHashString, ApiErrorResponse> {
    tokio::task::spawn_blocking(move || PasswordHashString::hash(&password))
        .await
        .map_err(|error| ApiErrorResponse::internal_error(&error))?
        .map_err(|error| ApiErrorResponse::internal_error(&error))
}

/// `POST /v{1,2}/users`
///
/// Registers an unactivated user and issues an activation token. The token is
/// only included in the response in the development environment.
///
/// # Response
///
/// - **202 Accepted** with `{"user": ...}`
/// - **422 Unprocessable Entity**: invalid fields or email already taken
///
/// # Errors
///
/// See above; store failures are 500.
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiErrorResponse> {
    let mut user = User::new(
        request.name,
        request.email,
        PasswordHashString::from_stored(String::new()),
    );

    let mut validator = Validator::new();
    validate_user(&mut validator, &user, &request.password);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    user.password_hash = hash_password(request.password).await?;
    state.user_repository.insert(&mut user).await?;

    let token = state
        .token_repository
        .new_token(
            user.id,
            TimeDelta::days(ACTIVATION_TOKEN_TTL_DAYS),
            TokenScope::Activation,
        )
        .await?;
    tracing::info!(user_id = %user.id, "user registered");

    let activation_token = state.config.exposes_activation_token().then_some(token);
    Ok((
        StatusCode::ACCEPTED,
        Json(UserEnvelope {
            user,
            activation_token,
        }),
    ))
}

/// `PUT /v{1,2}/users/activated`
///
/// Activates the owner of an activation token and revokes all of their
/// activation tokens.
///
/// # Errors
///
/// 422 for a malformed, unknown or expired token; 409 if the user changed
/// concurrently.
pub async fn activate_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ActivateUserRequest>,
) -> Result<Json<UserEnvelope>, ApiErrorResponse> {
    let mut validator = Validator::new();
    validate_token_plaintext(&mut validator, &request.token);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let mut user = match state
        .user_repository
        .get_for_token(TokenScope::Activation, &request.token)
        .await
    {
        Ok(user) => user,
        Err(RepositoryError::RecordNotFound) => {
            return Err(ApiErrorResponse::field_error(
                "token",
                "invalid or expired activation token",
            ));
        }
        Err(error) => return Err(error.into()),
    };

    user.activated = true;
    state.user_repository.update(&mut user).await?;
    state
        .token_repository
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;
    tracing::info!(user_id = %user.id, "user activated");

    Ok(Json(UserEnvelope {
        user,
        activation_token: None,
    }))
}
