//! Notes Backend API Library
//!
//! A notes service with optimistic concurrency control on updates and
//! token-authenticated, per-user access under `/v2`.
//!
//! - [`domain`]: notes, users, tokens, validation and listing filters
//! - [`infrastructure`]: repository traits with in-memory and `PostgreSQL` backends
//! - [`api`]: axum router, middleware and handlers

pub mod api;
pub mod domain;
pub mod infrastructure;
