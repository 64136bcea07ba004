//! Note domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;
use super::validator::{Validator, unique};

/// Maximum length of a note title, in bytes.
pub const MAX_TITLE_BYTES: usize = 500;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Store-assigned identifier of a note.
///
/// Valid identifiers are strictly positive. Values below 1 can still be
/// represented so that malformed path parameters and absent rows collapse
/// into the same not-found outcome at the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(i64);

impl NoteId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns `true` if the identifier could belong to a stored note.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl std::str::FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse().map(Self)
    }
}

// =============================================================================
// Note Entity
// =============================================================================

/// A note.
///
/// `id`, `created_at`, `last_updated_at` and `version` are owned by the
/// store: they are written back by `insert` and `update` and should not be
/// set by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
}

impl Note {
    /// Creates an unsaved note with the given title.
    ///
    /// The note has no identifier and version 0 until it is inserted.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NoteId::new(0),
            created_at: now,
            last_updated_at: now,
            title: title.into(),
            content: String::new(),
            tags: Vec::new(),
            version: 0,
            author_id: None,
        }
    }

    /// Sets the content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the author.
    #[must_use]
    pub const fn with_author(mut self, author_id: UserId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Returns `true` if the note belongs to `user_id`.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.author_id == Some(user_id)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks the persisted-state invariants of a note.
///
/// - `title` must be non-empty and at most 500 bytes
/// - `tags` must not contain duplicates (case-sensitive)
pub fn validate_note(validator: &mut Validator, note: &Note) {
    validator.check(!note.title.is_empty(), "title", "must be provided");
    validator.check(
        note.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );
    validator.check(unique(&note.tags), "tags", "must not contain duplicate values");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn validate(note: &Note) -> Validator {
        let mut validator = Validator::new();
        validate_note(&mut validator, note);
        validator
    }

    #[rstest]
    fn test_valid_note() {
        let note = Note::new("Hello").with_tags(["a", "b"]);
        assert!(validate(&note).valid());
    }

    #[rstest]
    fn test_empty_title_is_invalid() {
        let validator = validate(&Note::new(""));
        assert_eq!(validator.errors()["title"], "must be provided");
    }

    #[rstest]
    #[case(500, true)]
    #[case(501, false)]
    fn test_title_length_limit(#[case] length: usize, #[case] expected: bool) {
        let note = Note::new("x".repeat(length));
        assert_eq!(validate(&note).valid(), expected);
    }

    #[rstest]
    fn test_title_limit_counts_bytes_not_chars() {
        // 167 three-byte characters = 501 bytes
        let note = Note::new("\u{3042}".repeat(167));
        let validator = validate(&note);
        assert_eq!(
            validator.errors()["title"],
            "must not be more than 500 bytes long"
        );
    }

    #[rstest]
    fn test_duplicate_tags_are_invalid() {
        let note = Note::new("Hello").with_tags(["food", "food"]);
        let validator = validate(&note);
        assert_eq!(
            validator.errors()["tags"],
            "must not contain duplicate values"
        );
    }

    #[rstest]
    fn test_tags_compare_case_sensitively() {
        let note = Note::new("Hello").with_tags(["Food", "food"]);
        assert!(validate(&note).valid());
    }

    #[rstest]
    fn test_validation_does_not_mutate() {
        let note = Note::new("").with_tags(["a", "a"]);
        let before = note.clone();
        let _ = validate(&note);
        assert_eq!(note, before);
    }

    #[rstest]
    #[case(1, true)]
    #[case(0, false)]
    #[case(-5, false)]
    fn test_note_id_validity(#[case] raw: i64, #[case] expected: bool) {
        assert_eq!(NoteId::new(raw).is_valid(), expected);
    }

    #[rstest]
    fn test_serialization_omits_empty_optional_fields() {
        let note = Note::new("Hello");
        let json = serde_json::to_value(&note).unwrap();

        assert!(json.get("content").is_none());
        assert!(json.get("tags").is_none());
        assert!(json.get("author_id").is_none());
        assert_eq!(json["title"], "Hello");
    }
}
