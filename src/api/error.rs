//! API error handling.
//!
//! Every error leaves the service as `{"error": ...}` where the payload is
//! either a message string or, for validation failures, a field → message map.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::Validator;
use crate::infrastructure::RepositoryError;

pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";
pub const INTERNAL_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
pub const INVALID_TOKEN_MESSAGE: &str = "invalid or missing authentication token";
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str =
    "you must be authenticated to access this resource";
pub const INACTIVE_ACCOUNT_MESSAGE: &str =
    "your user account must be activated to access this resource";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid authentication credentials";

// =============================================================================
// API Error
// =============================================================================

/// Payload of the `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(BTreeMap<String, String>),
}

/// API error body: `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: ErrorMessage,
}

impl ApiError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorMessage::Text(message.into()),
        }
    }

    #[must_use]
    pub const fn fields(errors: BTreeMap<String, String>) -> Self {
        Self {
            error: ErrorMessage::Fields(errors),
        }
    }
}

// =============================================================================
// API Error Response
// =============================================================================

/// API error response containing status code and error details.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub error: ApiError,
    /// Adds `WWW-Authenticate: Bearer` to the response.
    pub bearer_challenge: bool,
}

impl ApiErrorResponse {
    #[must_use]
    pub const fn new(status: StatusCode, error: ApiError) -> Self {
        Self {
            status,
            error,
            bearer_challenge: false,
        }
    }

    /// 400 with a description of what was wrong with the request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiError::new(message))
    }

    /// 422 carrying the validator's field errors.
    #[must_use]
    pub fn failed_validation(validator: Validator) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::fields(validator.into_errors()),
        )
    }

    /// 422 for a single field.
    #[must_use]
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut validator = Validator::new();
        validator.add_error(field, message);
        Self::failed_validation(validator)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiError::new(NOT_FOUND_MESSAGE))
    }

    #[must_use]
    pub fn method_not_allowed(method: &Method) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            ApiError::new(format!(
                "the {method} method is not supported for this resource"
            )),
        )
    }

    #[must_use]
    pub fn edit_conflict() -> Self {
        Self::new(StatusCode::CONFLICT, ApiError::new(EDIT_CONFLICT_MESSAGE))
    }

    /// 500 with a fixed message. The cause is logged, never sent.
    #[must_use]
    pub fn internal_error(cause: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(INTERNAL_ERROR_MESSAGE),
        )
    }

    #[must_use]
    pub fn invalid_authentication_token() -> Self {
        Self {
            bearer_challenge: true,
            ..Self::new(StatusCode::UNAUTHORIZED, ApiError::new(INVALID_TOKEN_MESSAGE))
        }
    }

    #[must_use]
    pub fn authentication_required() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiError::new(AUTHENTICATION_REQUIRED_MESSAGE),
        )
    }

    #[must_use]
    pub fn inactive_account() -> Self {
        Self::new(StatusCode::FORBIDDEN, ApiError::new(INACTIVE_ACCOUNT_MESSAGE))
    }

    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiError::new(INVALID_CREDENTIALS_MESSAGE),
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.error)).into_response();
        if self.bearer_challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<RepositoryError> for ApiErrorResponse {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::RecordNotFound => Self::not_found(),
            RepositoryError::EditConflict => Self::edit_conflict(),
            RepositoryError::DuplicateEmail => {
                Self::field_error("email", "a user with this email address already exists")
            }
            RepositoryError::Timeout(_) | RepositoryError::Database(_) => {
                Self::internal_error(&error)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
