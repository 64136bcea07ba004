//! Infrastructure module for storage backends.
//!
//! This module contains the repository traits, their in-memory and
//! `PostgreSQL` implementations, and the factory that selects between them.

pub mod factory;
pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use factory::{
    ConfigurationError, FactoryError, Repositories, RepositoryConfig, RepositoryFactory,
    StorageMode, parse_positive_setting,
};
pub use in_memory::{InMemoryAccountRepository, InMemoryNoteRepository};
pub use postgres::{PostgresNoteRepository, PostgresTokenRepository, PostgresUserRepository};
pub use repository::{
    DEFAULT_QUERY_TIMEOUT, LATEST_LIMIT, NoteRepository, RepositoryError, TokenRepository,
    UserRepository, with_deadline,
};
