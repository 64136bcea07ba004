//! `PostgreSQL` repository implementations.
//!
//! This module provides `PostgreSQL`-based implementations of the repository
//! traits using `sqlx`. The schema lives in `migrations/` and is applied by the
//! repository factory at startup.
//!
//! # Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - Optimistic locking as a single conditional `UPDATE ... RETURNING`
//! - Sort columns checked against a safelist before being spliced into SQL
//! - Every statement bounded by the query timeout

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::token::hash_plaintext;
use crate::domain::{
    Filters, Note, NoteId, PaginatedResult, PasswordHashString, Token, TokenScope, User, UserId,
};
use crate::infrastructure::repository::{
    LATEST_LIMIT, NoteRepository, RepositoryError, TokenRepository, UserRepository, with_deadline,
};

/// Name of the unique constraint on `users.email`.
const USERS_EMAIL_KEY: &str = "users_email_key";

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct NoteRow {
    id: i64,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    title: String,
    content: String,
    tags: Vec<String>,
    version: i32,
    author_id: Option<i64>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Self {
            id: NoteId::new(row.id),
            created_at: row.created_at,
            last_updated_at: row.last_updated_at,
            title: row.title,
            content: row.content,
            tags: row.tags,
            version: row.version,
            author_id: row.author_id.map(UserId::new),
        }
    }
}

/// A note row with the window-function total of the listing query.
#[derive(Debug, sqlx::FromRow)]
struct ListedNoteRow {
    total_records: i64,
    #[sqlx(flatten)]
    note: NoteRow,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password_hash: PasswordHashString::from_stored(row.password_hash),
            activated: row.activated,
            version: row.version,
        }
    }
}

/// Maps a unique violation on the email column to `DuplicateEmail`.
fn map_user_write_error(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(database_error)
            if database_error.constraint() == Some(USERS_EMAIL_KEY) =>
        {
            RepositoryError::DuplicateEmail
        }
        _ => error.into(),
    }
}

// =============================================================================
// PostgreSQL Note Repository
// =============================================================================

/// `PostgreSQL` implementation of `NoteRepository`.
#[derive(Debug, Clone)]
pub struct PostgresNoteRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresNoteRepository {
    #[must_use]
    pub const fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn list(
        &self,
        title_prefix: &str,
        filters: &Filters,
        owner: Option<UserId>,
    ) -> Result<PaginatedResult<Note>, RepositoryError> {
        let column = filters.sort_column().ok_or_else(|| {
            RepositoryError::Database(format!("unsafe sort parameter: {}", filters.sort))
        })?;

        // `column` and the direction come from the safelist, never from raw input.
        let query = format!(
            "SELECT count(*) OVER() AS total_records, \
                    id, created_at, last_updated_at, title, content, tags, version, author_id \
             FROM notes \
             WHERE ($1 = '' OR lower(left(title, char_length($1))) = lower($1)) \
               AND ($2::bigint IS NULL OR author_id = $2) \
             ORDER BY {column} {direction}, id ASC \
             LIMIT $3 OFFSET $4",
            direction = filters.sort_direction().as_sql(),
        );

        #[allow(clippy::cast_possible_wrap)]
        let offset = filters.offset() as i64;

        let rows: Vec<ListedNoteRow> = sqlx::query_as(&query)
            .bind(title_prefix)
            .bind(owner.map(UserId::value))
            .bind(i64::from(filters.limit()))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        #[allow(clippy::cast_sign_loss)]
        let total_records = rows.first().map_or(0, |row| row.total_records as u64);
        let items = rows.into_iter().map(|row| Note::from(row.note)).collect();

        Ok(PaginatedResult::new(
            items,
            total_records,
            filters.page,
            filters.page_size,
        ))
    }
}

#[async_trait]
impl NoteRepository for PostgresNoteRepository {
    async fn insert(&self, note: &mut Note) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let (id, created_at, last_updated_at, version): (i64, DateTime<Utc>, DateTime<Utc>, i32) =
                sqlx::query_as(
                    "INSERT INTO notes (title, content, tags, author_id) \
                     VALUES ($1, $2, $3, $4) \
                     RETURNING id, created_at, last_updated_at, version",
                )
                .bind(&note.title)
                .bind(&note.content)
                .bind(&note.tags)
                .bind(note.author_id.map(UserId::value))
                .fetch_one(&self.pool)
                .await?;

            note.id = NoteId::new(id);
            note.created_at = created_at;
            note.last_updated_at = last_updated_at;
            note.version = version;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: NoteId) -> Result<Note, RepositoryError> {
        if !id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            let row: NoteRow = sqlx::query_as(
                "SELECT id, created_at, last_updated_at, title, content, tags, version, author_id \
                 FROM notes WHERE id = $1",
            )
            .bind(id.value())
            .fetch_one(&self.pool)
            .await?;

            Ok(Note::from(row))
        })
        .await
    }

    async fn update(&self, note: &mut Note) -> Result<(), RepositoryError> {
        if !note.id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            let row: Option<(i32, DateTime<Utc>)> = sqlx::query_as(
                "UPDATE notes \
                 SET title = $1, content = $2, tags = $3, \
                     last_updated_at = GREATEST(NOW(), last_updated_at + INTERVAL '1 microsecond'), \
                     version = version + 1 \
                 WHERE id = $4 AND version = $5 \
                 RETURNING version, last_updated_at",
            )
            .bind(&note.title)
            .bind(&note.content)
            .bind(&note.tags)
            .bind(note.id.value())
            .bind(note.version)
            .fetch_optional(&self.pool)
            .await?;

            let (version, last_updated_at) = row.ok_or(RepositoryError::EditConflict)?;
            note.version = version;
            note.last_updated_at = last_updated_at;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: NoteId) -> Result<(), RepositoryError> {
        if !id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            let result = sqlx::query("DELETE FROM notes WHERE id = $1")
                .bind(id.value())
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::RecordNotFound);
            }
            Ok(())
        })
        .await
    }

    async fn latest(&self) -> Result<Vec<Note>, RepositoryError> {
        with_deadline(self.query_timeout, async {
            #[allow(clippy::cast_possible_wrap)]
            let limit = LATEST_LIMIT as i64;

            let rows: Vec<NoteRow> = sqlx::query_as(
                "SELECT id, created_at, last_updated_at, title, content, tags, version, author_id \
                 FROM notes ORDER BY last_updated_at DESC, id DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows.into_iter().map(Note::from).collect())
        })
        .await
    }

    async fn get_all(
        &self,
        title_prefix: &str,
        filters: &Filters,
    ) -> Result<PaginatedResult<Note>, RepositoryError> {
        with_deadline(self.query_timeout, self.list(title_prefix, filters, None)).await
    }

    async fn get_all_by_user(
        &self,
        title_prefix: &str,
        filters: &Filters,
        user_id: UserId,
    ) -> Result<PaginatedResult<Note>, RepositoryError> {
        with_deadline(
            self.query_timeout,
            self.list(title_prefix, filters, Some(user_id)),
        )
        .await
    }
}

// =============================================================================
// PostgreSQL User Repository
// =============================================================================

/// `PostgreSQL` implementation of `UserRepository`.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresUserRepository {
    #[must_use]
    pub const fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: &mut User) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let (id, created_at, version): (i64, DateTime<Utc>, i32) = sqlx::query_as(
                "INSERT INTO users (name, email, password_hash, activated) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, version",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password_hash.as_str())
            .bind(user.activated)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_write_error)?;

            user.id = UserId::new(id);
            user.created_at = created_at;
            user.version = version;
            Ok(())
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        with_deadline(self.query_timeout, async {
            let row: UserRow = sqlx::query_as(
                "SELECT id, created_at, name, email, password_hash, activated, version \
                 FROM users WHERE email = $1",
            )
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

            Ok(User::from(row))
        })
        .await
    }

    async fn update(&self, user: &mut User) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let row: Option<(i32,)> = sqlx::query_as(
                "UPDATE users \
                 SET name = $1, email = $2, password_hash = $3, activated = $4, \
                     version = version + 1 \
                 WHERE id = $5 AND version = $6 \
                 RETURNING version",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.password_hash.as_str())
            .bind(user.activated)
            .bind(user.id.value())
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_write_error)?;

            let (version,) = row.ok_or(RepositoryError::EditConflict)?;
            user.version = version;
            Ok(())
        })
        .await
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, RepositoryError> {
        let hash = hash_plaintext(plaintext);

        with_deadline(self.query_timeout, async {
            let row: UserRow = sqlx::query_as(
                "SELECT users.id, users.created_at, users.name, users.email, \
                        users.password_hash, users.activated, users.version \
                 FROM users \
                 INNER JOIN tokens ON users.id = tokens.user_id \
                 WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > NOW()",
            )
            .bind(&hash)
            .bind(scope.as_str())
            .fetch_one(&self.pool)
            .await?;

            Ok(User::from(row))
        })
        .await
    }
}

// =============================================================================
// PostgreSQL Token Repository
// =============================================================================

/// `PostgreSQL` implementation of `TokenRepository`.
#[derive(Debug, Clone)]
pub struct PostgresTokenRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresTokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn insert(&self, token: &Token) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&token.hash)
                .bind(token.user_id.value())
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id.value())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
