//! In-memory repository implementations.
//!
//! These implementations mirror the `PostgreSQL` semantics (id assignment,
//! version guard, ownership scoping, paging) and are used for tests and
//! local development.
//!
//! # Features
//!
//! - Thread-safe with `Arc<RwLock<...>>`
//! - Compare-and-swap on `version` performed under a single write lock
//! - Every operation bounded by the query timeout

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::domain::token::hash_plaintext;
use crate::domain::{
    Filters, Note, NoteId, PaginatedResult, SortDirection, Token, TokenScope, User, UserId,
};
use crate::infrastructure::repository::{
    DEFAULT_QUERY_TIMEOUT, LATEST_LIMIT, NoteRepository, RepositoryError, TokenRepository,
    UserRepository, with_deadline,
};

/// Returns a timestamp strictly after `previous`, normally "now".
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = previous + TimeDelta::microseconds(1);
    now.max(floor)
}

// =============================================================================
// In-Memory Note Repository
// =============================================================================

#[derive(Debug, Default)]
struct NoteTable {
    rows: BTreeMap<NoteId, Note>,
    last_id: i64,
}

/// In-memory implementation of `NoteRepository`.
#[derive(Debug, Clone)]
pub struct InMemoryNoteRepository {
    notes: Arc<RwLock<NoteTable>>,
    query_timeout: Duration,
}

impl InMemoryNoteRepository {
    /// Creates an empty repository with the default query timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_QUERY_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(query_timeout: Duration) -> Self {
        Self {
            notes: Arc::new(RwLock::new(NoteTable::default())),
            query_timeout,
        }
    }

    async fn list(
        &self,
        title_prefix: &str,
        filters: &Filters,
        owner: Option<UserId>,
    ) -> Result<PaginatedResult<Note>, RepositoryError> {
        let column = sort_column(filters)?;
        let direction = filters.sort_direction();
        let prefix = title_prefix.to_lowercase();

        let table = self.notes.read().await;
        let mut matching: Vec<&Note> = table
            .rows
            .values()
            .filter(|note| owner.is_none_or(|user_id| note.is_owned_by(user_id)))
            .filter(|note| note.title.to_lowercase().starts_with(&prefix))
            .collect();

        matching.sort_by(|left, right| {
            let ordering = compare_by_column(left, right, column);
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            ordering.then_with(|| left.id.cmp(&right.id))
        });

        let total_records = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filters.offset()).unwrap_or(usize::MAX))
            .take(filters.limit() as usize)
            .cloned()
            .collect();

        Ok(PaginatedResult::new(
            items,
            total_records,
            filters.page,
            filters.page_size,
        ))
    }
}

impl Default for InMemoryNoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_column(filters: &Filters) -> Result<&str, RepositoryError> {
    filters
        .sort_column()
        .ok_or_else(|| RepositoryError::Database(format!("unsafe sort parameter: {}", filters.sort)))
}

fn compare_by_column(left: &Note, right: &Note, column: &str) -> Ordering {
    match column {
        "title" => left.title.cmp(&right.title),
        "created_at" => left.created_at.cmp(&right.created_at),
        "last_updated_at" => left.last_updated_at.cmp(&right.last_updated_at),
        _ => left.id.cmp(&right.id),
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn insert(&self, note: &mut Note) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let mut table = self.notes.write().await;
            table.last_id += 1;

            let now = Utc::now();
            note.id = NoteId::new(table.last_id);
            note.created_at = now;
            note.last_updated_at = now;
            note.version = 1;

            table.rows.insert(note.id, note.clone());
            Ok(())
        })
        .await
    }

    async fn get(&self, id: NoteId) -> Result<Note, RepositoryError> {
        if !id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            self.notes
                .read()
                .await
                .rows
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::RecordNotFound)
        })
        .await
    }

    async fn update(&self, note: &mut Note) -> Result<(), RepositoryError> {
        if !note.id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            let mut table = self.notes.write().await;
            let stored = table
                .rows
                .get_mut(&note.id)
                .filter(|stored| stored.version == note.version)
                .ok_or(RepositoryError::EditConflict)?;

            stored.title.clone_from(&note.title);
            stored.content.clone_from(&note.content);
            stored.tags.clone_from(&note.tags);
            stored.last_updated_at = next_timestamp(stored.last_updated_at);
            stored.version += 1;

            note.version = stored.version;
            note.last_updated_at = stored.last_updated_at;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: NoteId) -> Result<(), RepositoryError> {
        if !id.is_valid() {
            return Err(RepositoryError::RecordNotFound);
        }

        with_deadline(self.query_timeout, async {
            self.notes
                .write()
                .await
                .rows
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::RecordNotFound)
        })
        .await
    }

    async fn latest(&self) -> Result<Vec<Note>, RepositoryError> {
        with_deadline(self.query_timeout, async {
            let table = self.notes.read().await;
            let mut notes: Vec<Note> = table.rows.values().cloned().collect();
            notes.sort_by(|left, right| {
                right
                    .last_updated_at
                    .cmp(&left.last_updated_at)
                    .then_with(|| right.id.cmp(&left.id))
            });
            notes.truncate(LATEST_LIMIT);
            Ok(notes)
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
// In-Memory Account Repository (users + tokens)
// =============================================================================

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: UserId,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

#[derive(Debug, Default)]
struct AccountTables {
    users: BTreeMap<UserId, User>,
    tokens: HashMap<Vec<u8>, StoredToken>,
    last_id: i64,
}

/// In-memory implementation of both `UserRepository` and `TokenRepository`.
///
/// Users and tokens share one lock so that token lookups see a consistent
/// view of their owners.
#[derive(Debug, Clone)]
pub struct InMemoryAccountRepository {
    tables: Arc<RwLock<AccountTables>>,
    query_timeout: Duration,
}

impl InMemoryAccountRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_QUERY_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(query_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(AccountTables::default())),
            query_timeout,
        }
    }
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryAccountRepository {
    async fn insert(&self, user: &mut User) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let mut tables = self.tables.write().await;
            if tables.users.values().any(|existing| existing.email == user.email) {
                return Err(RepositoryError::DuplicateEmail);
            }

            tables.last_id += 1;
            user.id = UserId::new(tables.last_id);
            user.created_at = Utc::now();
            user.version = 1;

            tables.users.insert(user.id, user.clone());
            Ok(())
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        with_deadline(self.query_timeout, async {
            self.tables
                .read()
                .await
                .users
                .values()
                .find(|user| user.email == email)
                .cloned()
                .ok_or(RepositoryError::RecordNotFound)
        })
        .await
    }

    async fn update(&self, user: &mut User) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let mut tables = self.tables.write().await;
            let email_taken = tables
                .users
                .values()
                .any(|existing| existing.id != user.id && existing.email == user.email);
            if email_taken {
                return Err(RepositoryError::DuplicateEmail);
            }

            let stored = tables
                .users
                .get_mut(&user.id)
                .filter(|stored| stored.version == user.version)
                .ok_or(RepositoryError::EditConflict)?;

            stored.name.clone_from(&user.name);
            stored.email.clone_from(&user.email);
            stored.password_hash = user.password_hash.clone();
            stored.activated = user.activated;
            stored.version += 1;

            user.version = stored.version;
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
            let tables = self.tables.read().await;
            let token = tables
                .tokens
                .get(&hash)
                .filter(|token| token.scope == scope && token.expiry > Utc::now())
                .ok_or(RepositoryError::RecordNotFound)?;

            tables
                .users
                .get(&token.user_id)
                .cloned()
                .ok_or(RepositoryError::RecordNotFound)
        })
        .await
    }
}

#[async_trait]
impl TokenRepository for InMemoryAccountRepository {
    async fn insert(&self, token: &Token) -> Result<(), RepositoryError> {
        with_deadline(self.query_timeout, async {
            let mut tables = self.tables.write().await;
            if !tables.users.contains_key(&token.user_id) {
                return Err(RepositoryError::Database(format!(
                    "token owner {} does not exist",
                    token.user_id
                )));
            }

            let now = Utc::now();
            tables.tokens.retain(|_, stored| stored.expiry > now);
            tables.tokens.insert(
                token.hash.clone(),
                StoredToken {
                    user_id: token.user_id,
                    expiry: token.expiry,
                    scope: token.scope,
                },
            );
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
            self.tables
                .write()
                .await
                .tokens
                .retain(|_, token| !(token.scope == scope && token.user_id == user_id));
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NOTE_SORT_SAFELIST, PasswordHashString};
    use rstest::rstest;

    async fn insert(repository: &InMemoryNoteRepository, note: Note) -> Note {
        let mut note = note;
        repository.insert(&mut note).await.unwrap();
        note
    }

    // -------------------------------------------------------------------------
    // Note Repository
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    async fn test_insert_assigns_store_fields() {
        let repository = InMemoryNoteRepository::new();
        let note = insert(&repository, Note::new("Shopping")).await;

        assert!(note.id.value() > 0);
        assert_eq!(note.version, 1);
        assert_eq!(note.created_at, note.last_updated_at);
    }

    #[rstest]
    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let repository = InMemoryNoteRepository::new();
        let first = insert(&repository, Note::new("first")).await;
        repository.delete(first.id).await.unwrap();
        let second = insert(&repository, Note::new("second")).await;

        assert!(second.id > first.id);
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_returns_inserted_note() {
        let repository = InMemoryNoteRepository::new();
        let note = insert(&repository, Note::new("Shopping").with_tags(["food"])).await;

        assert_eq!(repository.get(note.id).await.unwrap(), note);
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(999)]
    #[tokio::test]
    async fn test_get_missing_is_not_found(#[case] raw: i64) {
        let repository = InMemoryNoteRepository::new();
        assert_eq!(
            repository.get(NoteId::new(raw)).await,
            Err(RepositoryError::RecordNotFound)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_bumps_version_and_timestamp() {
        let repository = InMemoryNoteRepository::new();
        let mut note = insert(&repository, Note::new("Shopping")).await;
        let previous_updated_at = note.last_updated_at;

        note.title = "Groceries".to_string();
        repository.update(&mut note).await.unwrap();

        assert_eq!(note.version, 2);
        assert!(note.last_updated_at > previous_updated_at);
        let stored = repository.get(note.id).await.unwrap();
        assert_eq!(stored.title, "Groceries");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.created_at, note.created_at);
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_with_stale_version_conflicts_and_leaves_row() {
        let repository = InMemoryNoteRepository::new();
        let note = insert(&repository, Note::new("Shopping")).await;

        let mut fresh = note.clone();
        fresh.title = "First writer".to_string();
        repository.update(&mut fresh).await.unwrap();

        let mut stale = note;
        stale.title = "Second writer".to_string();
        assert_eq!(
            repository.update(&mut stale).await,
            Err(RepositoryError::EditConflict)
        );

        let stored = repository.get(fresh.id).await.unwrap();
        assert_eq!(stored.title, "First writer");
        assert_eq!(stored.version, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_of_missing_note_conflicts() {
        let repository = InMemoryNoteRepository::new();
        let mut note = Note::new("ghost");
        note.id = NoteId::new(42);
        note.version = 1;

        assert_eq!(
            repository.update(&mut note).await,
            Err(RepositoryError::EditConflict)
        );
    }

    #[rstest]
    #[case(0)]
    #[case(-7)]
    #[tokio::test]
    async fn test_update_with_non_positive_id_is_not_found(#[case] raw: i64) {
        let repository = InMemoryNoteRepository::new();
        let mut note = Note::new("ghost");
        note.id = NoteId::new(raw);
        note.version = 1;

        assert_eq!(
            repository.update(&mut note).await,
            Err(RepositoryError::RecordNotFound)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let repository = InMemoryNoteRepository::new();
        let note = insert(&repository, Note::new("Shopping")).await;

        repository.delete(note.id).await.unwrap();

        assert_eq!(
            repository.get(note.id).await,
            Err(RepositoryError::RecordNotFound)
        );
        assert_eq!(
            repository.delete(note.id).await,
            Err(RepositoryError::RecordNotFound)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_latest_orders_by_last_update_and_caps_results() {
        let repository = InMemoryNoteRepository::new();
        for index in 0..30 {
            insert(&repository, Note::new(format!("note {index}"))).await;
        }
        let mut first = repository.get(NoteId::new(1)).await.unwrap();
        first.content = "touched".to_string();
        repository.update(&mut first).await.unwrap();

        let latest = repository.latest().await.unwrap();

        assert_eq!(latest.len(), LATEST_LIMIT);
        assert_eq!(latest[0].id, NoteId::new(1));
        assert!(
            latest
                .windows(2)
                .all(|pair| pair[0].last_updated_at >= pair[1].last_updated_at)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_all_filters_by_case_insensitive_prefix() {
        let repository = InMemoryNoteRepository::new();
        insert(&repository, Note::new("Shopping list")).await;
        insert(&repository, Note::new("shopping again")).await;
        insert(&repository, Note::new("Work")).await;

        let result = repository
            .get_all("SHOP", &Filters::for_notes())
            .await
            .unwrap();

        assert_eq!(result.total_records, 2);
        assert!(result.items.iter().all(|note| note.title.to_lowercase().starts_with("shop")));
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_all_sorts_and_pages() {
        let repository = InMemoryNoteRepository::new();
        for title in ["b", "a", "d", "c", "e"] {
            insert(&repository, Note::new(title)).await;
        }

        let filters = Filters::new(2, 2, "-title", NOTE_SORT_SAFELIST);
        let result = repository.get_all("", &filters).await.unwrap();

        let titles: Vec<&str> = result.items.iter().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
        assert_eq!(result.total_records, 5);
        assert_eq!(result.metadata().last_page, Some(3));
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_all_rejects_unsafe_sort() {
        let repository = InMemoryNoteRepository::new();
        let filters = Filters::new(1, 20, "password", NOTE_SORT_SAFELIST);

        assert!(matches!(
            repository.get_all("", &filters).await,
            Err(RepositoryError::Database(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_all_by_user_scopes_to_author() {
        let repository = InMemoryNoteRepository::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        insert(&repository, Note::new("alice 1").with_author(alice)).await;
        insert(&repository, Note::new("bob 1").with_author(bob)).await;
        insert(&repository, Note::new("alice 2").with_author(alice)).await;
        insert(&repository, Note::new("anonymous")).await;

        let result = repository
            .get_all_by_user("", &Filters::for_notes(), alice)
            .await
            .unwrap();

        assert_eq!(result.total_records, 2);
        assert!(result.items.iter().all(|note| note.is_owned_by(alice)));
    }

    // -------------------------------------------------------------------------
    // Account Repository
    // -------------------------------------------------------------------------

    fn new_user(email: &str) -> User {
        User::new(
            "Alice",
            email,
            PasswordHashString::from_stored("hash".to_string()),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let repository = InMemoryAccountRepository::new();
        UserRepository::insert(&repository, &mut new_user("alice@example.com"))
            .await
            .unwrap();

        assert_eq!(
            UserRepository::insert(&repository, &mut new_user("alice@example.com")).await,
            Err(RepositoryError::DuplicateEmail)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_token_resolves_owner_for_matching_scope_only() {
        let repository = InMemoryAccountRepository::new();
        let mut user = new_user("alice@example.com");
        UserRepository::insert(&repository, &mut user).await.unwrap();

        let token = repository
            .new_token(user.id, TimeDelta::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        let resolved = repository
            .get_for_token(TokenScope::Authentication, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(resolved.id, user.id);

        assert_eq!(
            repository
                .get_for_token(TokenScope::Activation, &token.plaintext)
                .await,
            Err(RepositoryError::RecordNotFound)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_expired_token_is_not_found() {
        let repository = InMemoryAccountRepository::new();
        let mut user = new_user("alice@example.com");
        UserRepository::insert(&repository, &mut user).await.unwrap();

        let token = repository
            .new_token(user.id, TimeDelta::seconds(-1), TokenScope::Authentication)
            .await
            .unwrap();

        assert_eq!(
            repository
                .get_for_token(TokenScope::Authentication, &token.plaintext)
                .await,
            Err(RepositoryError::RecordNotFound)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_insert_prunes_expired_tokens() {
        let repository = InMemoryAccountRepository::new();
        let mut user = new_user("alice@example.com");
        UserRepository::insert(&repository, &mut user).await.unwrap();

        for _ in 0..3 {
            repository
                .new_token(user.id, TimeDelta::seconds(-1), TokenScope::Authentication)
                .await
                .unwrap();
        }
        let live = repository
            .new_token(user.id, TimeDelta::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        let tables = repository.tables.read().await;
        assert_eq!(tables.tokens.len(), 1);
        assert!(tables.tokens.contains_key(&live.hash));
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_all_for_user_removes_scope_only() {
        let repository = InMemoryAccountRepository::new();
        let mut user = new_user("alice@example.com");
        UserRepository::insert(&repository, &mut user).await.unwrap();

        let activation = repository
            .new_token(user.id, TimeDelta::hours(1), TokenScope::Activation)
            .await
            .unwrap();
        let authentication = repository
            .new_token(user.id, TimeDelta::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        repository
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await
            .unwrap();

        assert!(
            repository
                .get_for_token(TokenScope::Activation, &activation.plaintext)
                .await
                .is_err()
        );
        assert!(
            repository
                .get_for_token(TokenScope::Authentication, &authentication.plaintext)
                .await
                .is_ok()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_user_update_is_version_guarded() {
        let repository = InMemoryAccountRepository::new();
        let mut user = new_user("alice@example.com");
        UserRepository::insert(&repository, &mut user).await.unwrap();

        let mut stale = user.clone();
        user.activated = true;
        UserRepository::update(&repository, &mut user).await.unwrap();
        assert_eq!(user.version, 2);

        stale.name = "Mallory".to_string();
        assert_eq!(
            UserRepository::update(&repository, &mut stale).await,
            Err(RepositoryError::EditConflict)
        );
    }
}
