//! Data Transfer Objects for API requests and responses.
//!
//! Every response body is an envelope: a JSON object with a named top-level
//! key (`note`, `notes`, `user`, ...).

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use super::error::ApiErrorResponse;
use crate::domain::{Filters, Metadata, Note, NoteId, Token, User, Validator};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

// =============================================================================
// JSON Body Extractor
// =============================================================================

/// `Json<T>` whose rejections are rendered as the 400 error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(describe_rejection(&rejection)),
        }
    }
}

fn describe_rejection(rejection: &JsonRejection) -> ApiErrorResponse {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiErrorResponse::bad_request(format!(
            "body must not be larger than {MAX_BODY_BYTES} bytes"
        ));
    }

    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiErrorResponse::bad_request("body must be JSON with Content-Type: application/json")
        }
        other => ApiErrorResponse::bad_request(other.body_text()),
    }
}

// =============================================================================
// Query and Path Extractors
// =============================================================================

/// `Query<T>` whose rejections are rendered as the 400 error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiErrorResponse::bad_request(rejection.body_text())),
        }
    }
}

/// The `{id}` path segment as a positive [`NoteId`].
///
/// A segment that fails to decode or parse is a 404, never a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteIdPath(pub NoteId);

impl<S> FromRequestParts<S> for NoteIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiErrorResponse::not_found())?;
        read_id_param(&raw).map(Self)
    }
}

/// Parses an `{id}` segment. Anything but a positive integer is a 404.
///
/// # Errors
///
/// Returns the not-found envelope for malformed or non-positive ids.
pub fn read_id_param(raw: &str) -> Result<NoteId, ApiErrorResponse> {
    raw.parse::<NoteId>()
        .ok()
        .filter(|id| id.is_valid())
        .ok_or_else(ApiErrorResponse::not_found)
}

// =============================================================================
// Patch
// =============================================================================

/// A field of a partial update: absent, explicitly `null`, or a value.
///
/// Use with `#[serde(default)]` so an absent key becomes `Missing`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Self::Null, Self::Value))
    }
}

// =============================================================================
// Note DTOs
// =============================================================================

/// Request DTO for creating a note.
///
/// A missing title deserializes as empty and is reported by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateNoteRequest {
    #[must_use]
    pub fn into_note(self) -> Note {
        Note::new(self.title)
            .with_content(self.content)
            .with_tags(self.tags)
    }
}

/// Request DTO for a partial note update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub content: Patch<String>,
    #[serde(default)]
    pub tags: Patch<Vec<String>>,
    /// Version the client last saw; checked before the store's own guard.
    #[serde(default)]
    pub version: Option<i32>,
}

impl UpdateNoteRequest {
    /// Applies the present fields to `note`.
    ///
    /// A `null` title is recorded in `validator`; `null` content or tags
    /// clear the field.
    pub fn apply(self, note: &mut Note, validator: &mut Validator) {
        match self.title {
            Patch::Missing => {}
            Patch::Null => validator.add_error("title", "must not be null"),
            Patch::Value(title) => note.title = title,
        }
        match self.content {
            Patch::Missing => {}
            Patch::Null => note.content.clear(),
            Patch::Value(content) => note.content = content,
        }
        match self.tags {
            Patch::Missing => {}
            Patch::Null => note.tags.clear(),
            Patch::Value(tags) => note.tags = tags,
        }
    }
}

/// Query string of the listing endpoints.
///
/// Numbers are kept as text so a malformed value becomes a field error
/// rather than a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotesQuery {
    pub title: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

impl ListNotesQuery {
    /// Title prefix and note filters, with parse failures in `validator`.
    pub fn into_filters(self, validator: &mut Validator) -> (String, Filters) {
        let defaults = Filters::for_notes();
        let page = read_int(self.page.as_deref(), defaults.page, "page", validator);
        let page_size = read_int(
            self.page_size.as_deref(),
            defaults.page_size,
            "page_size",
            validator,
        );
        let sort = self.sort.unwrap_or(defaults.sort);

        (
            self.title.unwrap_or_default(),
            Filters::new(page, page_size, sort, defaults.sort_safelist),
        )
    }
}

/// Parses an optional integer parameter, falling back to `default`.
///
/// Zero stays zero so that range validation reports it; negative and
/// non-numeric input is an "integer value" error.
fn read_int(raw: Option<&str>, default: u32, field: &str, validator: &mut Validator) -> u32 {
    match raw.filter(|value| !value.is_empty()) {
        None => default,
        Some(value) => match value.parse::<i64>() {
            Ok(parsed) if parsed < 0 => 0,
            Ok(parsed) => u32::try_from(parsed).unwrap_or(u32::MAX),
            Err(_) => {
                validator.add_error(field, "must be an integer value");
                default
            }
        },
    }
}

/// `{"note": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct NoteEnvelope {
    pub note: Note,
}

/// `{"notes": [...], "metadata": {...}}`; `metadata` is omitted by `latest`.
#[derive(Debug, Clone, Serialize)]
pub struct NoteListEnvelope {
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// `{"message": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

impl MessageEnvelope {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// User and Token DTOs
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAuthenticationTokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `{"user": ...}`, with the activation token outside production mailing.
#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_token: Option<Token>,
}

/// `{"authentication_token": {"token": ..., "expiry": ...}}`
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticationTokenEnvelope {
    pub authentication_token: Token,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("42", 42)]
    fn test_read_id_param_accepts_positive(#[case] raw: &str, #[case] expected: i64) {
        assert_eq!(read_id_param(raw).unwrap(), NoteId::new(expected));
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("abc")]
    #[case("1.5")]
    #[case("")]
    fn test_read_id_param_rejects(#[case] raw: &str) {
        let error = read_id_param(raw).unwrap_err();
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[tokio::test]
    async fn test_query_params_rejection_is_bad_request() {
        let (mut parts, ()) = HttpRequest::builder()
            .uri("/v1/notes?page=1&page=2")
            .body(())
            .unwrap()
            .into_parts();

        let error = QueryParams::<ListNotesQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(&error.error).unwrap();
        assert!(body["error"].as_str().unwrap().contains("duplicate field `page`"));
    }

    #[rstest]
    #[case(r"{}", Patch::Missing)]
    #[case(r#"{"title": null}"#, Patch::Null)]
    #[case(r#"{"title": "Groceries"}"#, Patch::Value("Groceries".to_string()))]
    fn test_patch_tri_state(#[case] body: &str, #[case] expected: Patch<String>) {
        let request: UpdateNoteRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.title, expected);
    }

    #[rstest]
    fn test_update_rejects_unknown_fields() {
        let result = serde_json::from_str::<UpdateNoteRequest>(r#"{"colour": "red"}"#);
        assert!(result.unwrap_err().to_string().contains("unknown field `colour`"));
    }

    #[rstest]
    fn test_apply_null_clears_content_and_tags() {
        let mut note = Note::new("Shopping")
            .with_content("eggs")
            .with_tags(["food"]);
        let request: UpdateNoteRequest =
            serde_json::from_str(r#"{"content": null, "tags": null}"#).unwrap();
        let mut validator = Validator::new();

        request.apply(&mut note, &mut validator);

        assert!(validator.valid());
        assert_eq!(note.title, "Shopping");
        assert!(note.content.is_empty());
        assert!(note.tags.is_empty());
    }

    #[rstest]
    fn test_apply_null_title_is_field_error() {
        let mut note = Note::new("Shopping");
        let request: UpdateNoteRequest = serde_json::from_str(r#"{"title": null}"#).unwrap();
        let mut validator = Validator::new();

        request.apply(&mut note, &mut validator);

        assert_eq!(validator.errors()["title"], "must not be null");
        assert_eq!(note.title, "Shopping");
    }

    #[rstest]
    fn test_create_request_missing_title_is_empty() {
        let request: CreateNoteRequest = serde_json::from_str(r#"{"tags": ["a"]}"#).unwrap();
        assert!(request.title.is_empty());
    }

    #[rstest]
    fn test_list_query_defaults() {
        let mut validator = Validator::new();
        let (prefix, filters) = ListNotesQuery::default().into_filters(&mut validator);

        assert!(validator.valid());
        assert!(prefix.is_empty());
        assert_eq!(filters, Filters::for_notes());
    }

    #[rstest]
    #[case(Some("3"), 3)]
    #[case(Some(""), 1)]
    #[case(Some("0"), 0)]
    #[case(Some("-4"), 0)]
    #[case(None, 1)]
    fn test_read_int(#[case] raw: Option<&str>, #[case] expected: u32) {
        let mut validator = Validator::new();
        assert_eq!(read_int(raw, 1, "page", &mut validator), expected);
        assert!(validator.valid());
    }

    #[rstest]
    fn test_read_int_rejects_text() {
        let mut validator = Validator::new();
        read_int(Some("two"), 1, "page", &mut validator);
        assert_eq!(validator.errors()["page"], "must be an integer value");
    }
}
