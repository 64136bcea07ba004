//! Bearer tokens for account activation and authentication.
//!
//! A token is handed to the client once in plaintext; the store only ever
//! sees its SHA-256 hash.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::user::UserId;
use super::validator::Validator;

/// Number of random bytes behind a token.
const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of a plaintext token (hex encoded).
pub const TOKEN_PLAINTEXT_LENGTH: usize = TOKEN_ENTROPY_BYTES * 2;

/// What a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    /// Database representation of the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: UserId,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Generates a random token for `user_id` valid for `ttl`.
    #[must_use]
    pub fn generate(user_id: UserId, ttl: Duration, scope: TokenScope) -> Self {
        let mut bytes = [0_u8; TOKEN_ENTROPY_BYTES];
        rand::rng().fill(&mut bytes[..]);
        let plaintext = hex::encode(bytes);
        let hash = hash_plaintext(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

/// SHA-256 of a plaintext token, the form tokens are stored and looked up in.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn validate_token_plaintext(validator: &mut Validator, plaintext: &str) {
    validator.check(!plaintext.is_empty(), "token", "must be provided");
    validator.check(
        plaintext.len() == TOKEN_PLAINTEXT_LENGTH,
        "token",
        "must be 32 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_generated_token_shape() {
        let token = Token::generate(UserId::new(7), Duration::hours(1), TokenScope::Authentication);

        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LENGTH);
        assert!(token.plaintext.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.hash, hash_plaintext(&token.plaintext));
        assert_eq!(token.hash.len(), 32);
        assert!(token.expiry > Utc::now());
    }

    #[rstest]
    fn test_generated_tokens_differ() {
        let first = Token::generate(UserId::new(1), Duration::hours(1), TokenScope::Activation);
        let second = Token::generate(UserId::new(1), Duration::hours(1), TokenScope::Activation);
        assert_ne!(first.plaintext, second.plaintext);
    }

    #[rstest]
    fn test_serialization_exposes_only_plaintext_and_expiry() {
        let token = Token::generate(UserId::new(1), Duration::hours(1), TokenScope::Authentication);
        let json = serde_json::to_value(&token).unwrap();

        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(json["token"], token.plaintext.as_str());
        assert!(object.contains_key("expiry"));
    }

    #[rstest]
    #[case("", false)]
    #[case("abc", false)]
    #[case("0123456789abcdef0123456789abcdef", true)]
    fn test_validate_token_plaintext(#[case] plaintext: &str, #[case] expected: bool) {
        let mut validator = Validator::new();
        validate_token_plaintext(&mut validator, plaintext);
        assert_eq!(validator.valid(), expected);
    }
}
