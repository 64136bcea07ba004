//! Note handlers.
//!
//! `/v1/notes` is global. `/v2/notes` runs behind `require_activated_user`
//! and is scoped to the caller: listings use `get_all_by_user`, and a note
//! owned by someone else is reported as not found.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::auth::ActivatedUser;
use super::dto::{
    CreateNoteRequest, JsonBody, ListNotesQuery, MessageEnvelope, NoteEnvelope, NoteIdPath,
    NoteListEnvelope, QueryParams, UpdateNoteRequest,
};
use super::error::ApiErrorResponse;
use super::handlers::AppState;
use crate::domain::{Note, NoteId, UserId, Validator, validate_filters, validate_note};

// =============================================================================
// Shared Operations
// =============================================================================

async fn list(
    state: &AppState,
    query: ListNotesQuery,
    owner: Option<UserId>,
) -> Result<Json<NoteListEnvelope>, ApiErrorResponse> {
    let mut validator = Validator::new();
    let (title_prefix, filters) = query.into_filters(&mut validator);
    validate_filters(&mut validator, &filters);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let page = match owner {
        Some(user_id) => {
            state
                .note_repository
                .get_all_by_user(&title_prefix, &filters, user_id)
                .await?
        }
        None => state.note_repository.get_all(&title_prefix, &filters).await?,
    };

    let metadata = page.metadata();
    Ok(Json(NoteListEnvelope {
        notes: page.items,
        metadata: Some(metadata),
    }))
}

async fn create(
    state: &AppState,
    request: CreateNoteRequest,
    owner: Option<UserId>,
    base_path: &str,
) -> Result<Response, ApiErrorResponse> {
    let mut note = request.into_note();
    note.author_id = owner;

    let mut validator = Validator::new();
    validate_note(&mut validator, &note);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    state.note_repository.insert(&mut note).await?;
    tracing::info!(note_id = %note.id, author_id = ?note.author_id, "note created");

    let location = HeaderValue::try_from(format!("{base_path}/{}", note.id))
        .map_err(|error| ApiErrorResponse::internal_error(&error))?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(NoteEnvelope { note }),
    )
        .into_response())
}

/// Fetches a note, hiding notes that belong to someone other than `owner`.
async fn fetch(
    state: &AppState,
    id: NoteId,
    owner: Option<UserId>,
) -> Result<Note, ApiErrorResponse> {
    let note = state.note_repository.get(id).await?;

    match owner {
        Some(user_id) if !note.is_owned_by(user_id) => Err(ApiErrorResponse::not_found()),
        _ => Ok(note),
    }
}

async fn update(
    state: &AppState,
    id: NoteId,
    request: UpdateNoteRequest,
    owner: Option<UserId>,
) -> Result<Json<NoteEnvelope>, ApiErrorResponse> {
    let mut note = fetch(state, id, owner).await?;

    if request.version.is_some_and(|expected| expected != note.version) {
        return Err(ApiErrorResponse::edit_conflict());
    }

    let mut validator = Validator::new();
    request.apply(&mut note, &mut validator);
    validate_note(&mut validator, &note);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    state.note_repository.update(&mut note).await?;
    Ok(Json(NoteEnvelope { note }))
}

async fn delete(
    state: &AppState,
    id: NoteId,
    owner: Option<UserId>,
) -> Result<Json<MessageEnvelope>, ApiErrorResponse> {
    if owner.is_some() {
        fetch(state, id, owner).await?;
    }

    state.note_repository.delete(id).await?;
    tracing::info!(note_id = %id, "note deleted");

    Ok(Json(MessageEnvelope::new("note successfully deleted")))
}

// =============================================================================
// /v1/notes
// =============================================================================

/// `GET /v1/notes?title=&page=&page_size=&sort=`
///
/// # Errors
///
/// 422 for invalid filters, 500 if the store fails.
pub async fn list_notes(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListNotesQuery>,
) -> Result<Json<NoteListEnvelope>, ApiErrorResponse> {
    list(&state, query, None).await
}

/// `GET /v1/notes/latest`: the most recently updated notes.
///
/// # Errors
///
/// 500 if the store fails.
pub async fn latest_notes(
    State(state): State<AppState>,
) -> Result<Json<NoteListEnvelope>, ApiErrorResponse> {
    let notes = state.note_repository.latest().await?;
    Ok(Json(NoteListEnvelope {
        notes,
        metadata: None,
    }))
}

/// `POST /v1/notes`
///
/// # Request Body
///
/// ```json
/// {"title": "Shopping", "content": "eggs, milk", "tags": ["food", "urgent"]}
/// ```
///
/// # Response
///
/// - **201 Created** with `Location: /v1/notes/{id}` and `{"note": ...}`
/// - **400 Bad Request**: malformed JSON or unknown fields
/// - **422 Unprocessable Entity**: validation errors
///
/// # Errors
///
/// See above; store failures are 500.
pub async fn create_note(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateNoteRequest>,
) -> Result<Response, ApiErrorResponse> {
    create(&state, request, None, "/v1/notes").await
}

/// `GET /v1/notes/{id}`
///
/// # Errors
///
/// 404 for malformed or unknown ids.
pub async fn show_note(
    State(state): State<AppState>,
    NoteIdPath(id): NoteIdPath,
) -> Result<Json<NoteEnvelope>, ApiErrorResponse> {
    let note = fetch(&state, id, None).await?;
    Ok(Json(NoteEnvelope { note }))
}

/// `PATCH /v1/notes/{id}`: partial update guarded by the note's version.
///
/// # Errors
///
/// 404 for unknown ids, 409 on a version mismatch or a lost race, 422 for
/// validation errors.
pub async fn update_note(
    State(state): State<AppState>,
    NoteIdPath(id): NoteIdPath,
    JsonBody(request): JsonBody<UpdateNoteRequest>,
) -> Result<Json<NoteEnvelope>, ApiErrorResponse> {
    update(&state, id, request, None).await
}

/// `DELETE /v1/notes/{id}`
///
/// # Errors
///
/// 404 for malformed or unknown ids.
pub async fn delete_note(
    State(state): State<AppState>,
    NoteIdPath(id): NoteIdPath,
) -> Result<Json<MessageEnvelope>, ApiErrorResponse> {
    delete(&state, id, None).await
}

// =============================================================================
// /v2/notes
// =============================================================================

/// `GET /v2/notes`: the caller's notes only.
///
/// # Errors
///
/// 422 for invalid filters.
pub async fn list_user_notes(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
    QueryParams(query): QueryParams<ListNotesQuery>,
) -> Result<Json<NoteListEnvelope>, ApiErrorResponse> {
    list(&state, query, Some(user.id)).await
}

/// `POST /v2/notes`: creates a note authored by the caller.
///
/// # Errors
///
/// 400 for malformed bodies, 422 for validation errors.
pub async fn create_user_note(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
    JsonBody(request): JsonBody<CreateNoteRequest>,
) -> Result<Response, ApiErrorResponse> {
    create(&state, request, Some(user.id), "/v2/notes").await
}

/// `GET /v2/notes/{id}`
///
/// # Errors
///
/// 404 for unknown ids and for notes owned by another user.
pub async fn show_user_note(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
    NoteIdPath(id): NoteIdPath,
) -> Result<Json<NoteEnvelope>, ApiErrorResponse> {
    let note = fetch(&state, id, Some(user.id)).await?;
    Ok(Json(NoteEnvelope { note }))
}

/// `PATCH /v2/notes/{id}`
///
/// # Errors
///
/// As `update_note`, with other users' notes reported as 404.
pub async fn update_user_note(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
    NoteIdPath(id): NoteIdPath,
    JsonBody(request): JsonBody<UpdateNoteRequest>,
) -> Result<Json<NoteEnvelope>, ApiErrorResponse> {
    update(&state, id, request, Some(user.id)).await
}

/// `DELETE /v2/notes/{id}`
///
/// # Errors
///
/// 404 for unknown ids and for notes owned by another user.
pub async fn delete_user_note(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
    NoteIdPath(id): NoteIdPath,
) -> Result<Json<MessageEnvelope>, ApiErrorResponse> {
    delete(&state, id, Some(user.id)).await
}
