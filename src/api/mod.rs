//! API module for HTTP handlers.
//!
//! This module contains route definitions, middleware and request/response
//! handlers.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod notes;
pub mod routes;
pub mod tokens;
pub mod users;

pub use auth::{ActivatedUser, Principal, authenticate, require_activated_user};
pub use dto::{
    CreateNoteRequest, JsonBody, ListNotesQuery, NoteEnvelope, NoteIdPath, NoteListEnvelope,
    Patch, QueryParams, UpdateNoteRequest, read_id_param,
};
pub use error::{ApiError, ApiErrorResponse, ErrorMessage};
pub use handlers::{AppConfig, AppState, Environment, HealthResponse, healthcheck, ping};
pub use notes::{
    create_note, create_user_note, delete_note, delete_user_note, latest_notes, list_notes,
    list_user_notes, show_note, show_user_note, update_note, update_user_note,
};
pub use routes::build_router;
pub use tokens::create_authentication_token;
pub use users::{activate_user, register_user};
