//! User domain model and credential handling.

use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::validator::Validator;

pub const MAX_NAME_BYTES: usize = 500;
pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap_or_else(|error| unreachable!("email pattern is a valid regex: {error}"))
});

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Store-assigned identifier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// An argon2id password hash in PHC string form.
///
/// The plaintext never leaves the request that supplied it; only the hash
/// is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    /// Hashes `plaintext` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns the underlying hasher error if hashing fails.
    pub fn hash(plaintext: &str) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(plaintext.as_bytes(), &salt)?;
        Ok(Self(hash.to_string()))
    }

    /// Wraps a hash loaded from storage.
    #[must_use]
    pub const fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    /// Returns `true` if `plaintext` matches this hash.
    ///
    /// A malformed stored hash never matches.
    #[must_use]
    pub fn matches(&self, plaintext: &str) -> bool {
        PasswordHash::new(&self.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHashString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("PasswordHashString(..)")
    }
}

// =============================================================================
// User Entity
// =============================================================================

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: PasswordHashString,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl User {
    /// Creates an unsaved, unactivated user.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: PasswordHashString,
    ) -> Self {
        Self {
            id: UserId::new(0),
            created_at: Utc::now(),
            name: name.into(),
            email: email.into(),
            password_hash,
            activated: false,
            version: 0,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

pub fn validate_email(validator: &mut Validator, email: &str) {
    validator.check(!email.is_empty(), "email", "must be provided");
    validator.check(
        EMAIL_PATTERN.is_match(email),
        "email",
        "must be a valid email address",
    );
}

pub fn validate_password_plaintext(validator: &mut Validator, password: &str) {
    validator.check(!password.is_empty(), "password", "must be provided");
    validator.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    validator.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

/// Validates a registration: name, email, and the plaintext password.
pub fn validate_user(validator: &mut Validator, user: &User, password: &str) {
    validator.check(!user.name.is_empty(), "name", "must be provided");
    validator.check(
        user.name.len() <= MAX_NAME_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(validator, &user.email);
    validate_password_plaintext(validator, password);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice@example.com", true)]
    #[case("alice.smith+notes@mail.example.org", true)]
    #[case("alice@", false)]
    #[case("not an email", false)]
    #[case("", false)]
    fn test_validate_email(#[case] email: &str, #[case] expected: bool) {
        let mut validator = Validator::new();
        validate_email(&mut validator, email);
        assert_eq!(validator.valid(), expected);
    }

    #[rstest]
    #[case("pa55word", true)]
    #[case("short", false)]
    #[case("", false)]
    fn test_validate_password(#[case] password: &str, #[case] expected: bool) {
        let mut validator = Validator::new();
        validate_password_plaintext(&mut validator, password);
        assert_eq!(validator.valid(), expected);
    }

    #[rstest]
    fn test_password_too_long() {
        let mut validator = Validator::new();
        validate_password_plaintext(&mut validator, &"x".repeat(73));
        assert_eq!(
            validator.errors()["password"],
            "must not be more than 72 bytes long"
        );
    }

    #[rstest]
    fn test_password_hash_roundtrip() {
        let hash = PasswordHashString::hash("pa55word").unwrap();
        assert!(hash.matches("pa55word"));
        assert!(!hash.matches("wrong-password"));
    }

    #[rstest]
    fn test_malformed_hash_never_matches() {
        let hash = PasswordHashString::from_stored("not-a-phc-string".to_string());
        assert!(!hash.matches("anything"));
    }

    #[rstest]
    fn test_serialization_hides_credentials() {
        let user = User::new(
            "Alice",
            "alice@example.com",
            PasswordHashString::from_stored("secret".to_string()),
        );
        let json = serde_json::to_value(&user).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json["activated"], false);
    }

    #[rstest]
    fn test_validate_user_reports_each_field() {
        let user = User::new("", "bad", PasswordHashString::from_stored(String::new()));
        let mut validator = Validator::new();
        validate_user(&mut validator, &user, "x");

        let errors = validator.into_errors();
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }
}
