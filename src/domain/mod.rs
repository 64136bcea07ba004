//! Domain module for notes and their owners.
//!
//! This module contains domain models, value objects, and validation rules.

pub mod filters;
pub mod note;
pub mod token;
pub mod user;
pub mod validator;

pub use filters::{
    Filters, Metadata, NOTE_SORT_SAFELIST, PaginatedResult, SortDirection, validate_filters,
};
pub use note::{Note, NoteId, validate_note};
pub use token::{Token, TokenScope, validate_token_plaintext};
pub use user::{
    PasswordHashString, User, UserId, validate_email, validate_password_plaintext, validate_user,
};
pub use validator::Validator;
