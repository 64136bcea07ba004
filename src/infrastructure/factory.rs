//! Repository factory for runtime backend selection.
//!
//! This module provides a factory pattern for creating repository instances
//! based on environment configuration. It supports switching between `InMemory`
//! and `PostgreSQL` backends at runtime.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DB_MAX_CONNECTIONS`: pool size (default 25)
//! - `DB_ACQUIRE_TIMEOUT_SECS`: seconds to wait for a pooled connection (default 5)
//! - `DB_QUERY_TIMEOUT_SECS`: bound on each store operation (default 3)
//!
//! # Example
//!
//! ```ignore
//! use notes_backend_api::infrastructure::RepositoryFactory;
//!
//! let repositories = RepositoryFactory::from_env()?.create().await?;
//! let note = repositories.note_repository.get(NoteId::new(1)).await?;
//! ```

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::{
    InMemoryAccountRepository, InMemoryNoteRepository, NoteRepository, PostgresNoteRepository,
    PostgresTokenRepository, PostgresUserRepository, TokenRepository, UserRepository,
};
use crate::infrastructure::repository::DEFAULT_QUERY_TIMEOUT;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration Types
// =============================================================================

/// Storage mode for persistent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Process-local storage. Suitable for testing and development.
    #[default]
    InMemory,
    /// `PostgreSQL` storage for production use.
    Postgres,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    /// Parses a storage mode from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidStorageMode` if the string is not recognized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Configuration for repository factory.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub storage_mode: StorageMode,
    /// `PostgreSQL` connection URL (required when `storage_mode` is `Postgres`).
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Bound applied to every repository operation.
    pub query_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl RepositoryConfig {
    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if:
    /// - `STORAGE_MODE` contains an invalid value
    /// - a numeric variable is not a positive integer
    /// - `DATABASE_URL` is missing when `STORAGE_MODE=postgres`
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let storage_mode = match env::var("STORAGE_MODE") {
            Ok(value) => value.parse()?,
            Err(env::VarError::NotPresent) => StorageMode::default(),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigurationError::InvalidStorageMode(
                    "<non-UTF-8 value>".to_string(),
                ));
            }
        };

        // Empty or whitespace-only is treated as unset
        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let max_connections =
            parse_positive_var("DB_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let acquire_timeout = parse_positive_var("DB_ACQUIRE_TIMEOUT_SECS")?
            .map_or(DEFAULT_ACQUIRE_TIMEOUT, |secs| Duration::from_secs(secs.into()));
        let query_timeout = parse_positive_var("DB_QUERY_TIMEOUT_SECS")?
            .map_or(DEFAULT_QUERY_TIMEOUT, |secs| Duration::from_secs(secs.into()));

        let config = Self {
            storage_mode,
            database_url,
            max_connections,
            acquire_timeout,
            query_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingDatabaseUrl` if `PostgreSQL` is
    /// selected without a URL.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage_mode == StorageMode::Postgres && self.database_url.is_none() {
            return Err(ConfigurationError::MissingDatabaseUrl);
        }
        Ok(())
    }
}

fn parse_positive_var(name: &'static str) -> Result<Option<u32>, ConfigurationError> {
    parse_positive_setting(name, env::var(name).ok().as_deref())
}

/// Parses a positive integer setting named `name`; unset or blank yields `None`.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidNumber` for zero, negative or
/// non-numeric input.
pub fn parse_positive_setting(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Option<u32>, ConfigurationError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        _ => Err(ConfigurationError::InvalidNumber {
            name,
            value: value.to_string(),
        }),
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors in service configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'postgres'")]
    InvalidStorageMode(String),

    #[error("Invalid environment: '{0}'. Expected 'development', 'staging' or 'production'")]
    InvalidEnvironment(String),

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("DATABASE_URL environment variable is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,
}

/// Errors that can occur during factory initialization.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    #[error("Database migration error: {0}")]
    Migration(String),
}

// =============================================================================
// Repository Factory
// =============================================================================

/// Collection of initialized repositories, shared across request handlers.
#[derive(Clone)]
pub struct Repositories {
    pub note_repository: Arc<dyn NoteRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub token_repository: Arc<dyn TokenRepository>,
}

impl Repositories {
    /// Process-local repositories with the given query timeout.
    #[must_use]
    pub fn in_memory(query_timeout: Duration) -> Self {
        let accounts = Arc::new(InMemoryAccountRepository::with_timeout(query_timeout));
        Self {
            note_repository: Arc::new(InMemoryNoteRepository::with_timeout(query_timeout)),
            user_repository: accounts.clone(),
            token_repository: accounts,
        }
    }

    /// `PostgreSQL`-backed repositories sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool, query_timeout: Duration) -> Self {
        Self {
            note_repository: Arc::new(PostgresNoteRepository::new(pool.clone(), query_timeout)),
            user_repository: Arc::new(PostgresUserRepository::new(pool.clone(), query_timeout)),
            token_repository: Arc::new(PostgresTokenRepository::new(pool.clone(), query_timeout)),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Repositories")
            .field("note_repository", &"Arc<dyn NoteRepository>")
            .field("user_repository", &"Arc<dyn UserRepository>")
            .field("token_repository", &"Arc<dyn TokenRepository>")
            .finish()
    }
}

/// Factory for creating repository instances based on configuration.
///
/// For `PostgreSQL` the factory opens the pool, verifies connectivity and
/// applies pending migrations before handing out repositories.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates a new repository factory from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Configuration` if environment configuration is invalid.
    pub fn from_env() -> Result<Self, FactoryError> {
        let config = RepositoryConfig::from_env()?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Creates all repositories based on the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if the database is unreachable or a migration fails.
    pub async fn create(&self) -> Result<Repositories, FactoryError> {
        match self.config.storage_mode {
            StorageMode::InMemory => Ok(Repositories::in_memory(self.config.query_timeout)),
            StorageMode::Postgres => {
                let pool = self.create_postgres_pool().await?;

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|error| FactoryError::Migration(error.to_string()))?;

                Ok(Repositories::postgres(&pool, self.config.query_timeout))
            }
        }
    }

    /// Creates a `PostgreSQL` connection pool.
    ///
    /// `connect` establishes one connection up front, so an unreachable
    /// database fails here rather than on the first request.
    async fn create_postgres_pool(&self) -> Result<PgPool, FactoryError> {
        let database_url = self
            .config
            .database_url
            .as_ref()
            .ok_or(ConfigurationError::MissingDatabaseUrl)?;

        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
