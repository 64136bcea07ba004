//! Repository traits for domain entities.
//!
//! Every operation is asynchronous and bounded by a deadline: the
//! implementations wrap their work in [`with_deadline`], so a caller never
//! waits longer than the configured query timeout. Dropping the returned
//! future cancels the operation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Filters, Note, NoteId, PaginatedResult, Token, TokenScope, User, UserId};

/// Default bound on a single store operation.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Maximum number of notes returned by [`NoteRepository::latest`].
pub const LATEST_LIMIT: usize = 25;

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record matches the identifier.
    #[error("record not found")]
    RecordNotFound,

    /// The optimistic-concurrency guard matched no row: the record was
    /// changed or removed since it was read.
    #[error("edit conflict")]
    EditConflict,

    /// A user with the same email address already exists.
    #[error("duplicate email")]
    DuplicateEmail,

    /// The operation did not finish within the query timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, constraint or decoding failure.
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::RecordNotFound,
            other => Self::Database(other.to_string()),
        }
    }
}

/// Runs `operation`, failing with [`RepositoryError::Timeout`] once `timeout`
/// has elapsed.
///
/// # Errors
///
/// Returns the operation's own error, or `Timeout` if the deadline passes first.
pub async fn with_deadline<T, F>(timeout: Duration, operation: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| RepositoryError::Timeout(timeout))?
}

// =============================================================================
// Note Repository
// =============================================================================

/// Persistent storage for notes.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Inserts a new note.
    ///
    /// On success the store-owned fields of `note` (`id`, `created_at`,
    /// `last_updated_at`, `version = 1`) are overwritten with the stored values.
    async fn insert(&self, note: &mut Note) -> Result<(), RepositoryError>;

    /// Fetches a note by id. Ids below 1 are reported as `RecordNotFound`.
    async fn get(&self, id: NoteId) -> Result<Note, RepositoryError>;

    /// Writes `title`, `content` and `tags` if the stored version still equals
    /// `note.version`, bumping the version and refreshing `last_updated_at`
    /// in the same atomic step.
    ///
    /// A non-positive id is `RecordNotFound`. A guard miss is reported as
    /// `EditConflict`, whether the note changed or no longer exists. On success `note.version` and
    /// `note.last_updated_at` are overwritten with the stored values.
    async fn update(&self, note: &mut Note) -> Result<(), RepositoryError>;

    /// Hard-deletes a note. Ids below 1 and absent rows are `RecordNotFound`.
    async fn delete(&self, id: NoteId) -> Result<(), RepositoryError>;

    /// Returns at most [`LATEST_LIMIT`] notes, most recently updated first.
    async fn latest(&self) -> Result<Vec<Note>, RepositoryError>;

    /// Lists notes whose title starts with `title_prefix` (case-insensitive,
    /// empty matches all), ordered and paged by `filters`.
    async fn get_all(
        &self,
        title_prefix: &str,
        filters: &Filters,
    ) -> Result<PaginatedResult<Note>, RepositoryError>;

    /// As [`get_all`](Self::get_all), restricted to notes authored by `user_id`.
    async fn get_all_by_user(
        &self,
        title_prefix: &str,
        filters: &Filters,
        user_id: UserId,
    ) -> Result<PaginatedResult<Note>, RepositoryError>;
}

// =============================================================================
// User Repository
// =============================================================================

/// Persistent storage for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user, writing back `id`, `created_at` and `version = 1`.
    ///
    /// Fails with `DuplicateEmail` if the address is taken.
    async fn insert(&self, user: &mut User) -> Result<(), RepositoryError>;

    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError>;

    /// Version-guarded update of name, email, password hash and activation.
    async fn update(&self, user: &mut User) -> Result<(), RepositoryError>;

    /// Resolves the owner of an unexpired token of the given scope.
    async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, RepositoryError>;
}

// =============================================================================
// Token Repository
// =============================================================================

/// Persistent storage for token hashes.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Generates and stores a token, returning it with its plaintext.
    async fn new_token(
        &self,
        user_id: UserId,
        ttl: chrono::Duration,
        scope: TokenScope,
    ) -> Result<Token, RepositoryError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }

    async fn insert(&self, token: &Token) -> Result<(), RepositoryError>;

    /// Removes every token of `scope` belonging to `user_id`.
    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: UserId,
    ) -> Result<(), RepositoryError>;
}
