//! Application state and service-level handlers.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::infrastructure::{
    ConfigurationError, NoteRepository, Repositories, TokenRepository, UserRepository,
};

/// Service version reported by the health check.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Application Configuration
// =============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigurationError::InvalidEnvironment(value.to_string())),
        }
    }
}

/// Application configuration for runtime settings.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub environment: Environment,
}

impl AppConfig {
    /// Reads `ENVIRONMENT` (default `development`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidEnvironment` for unknown values.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let environment = match env::var("ENVIRONMENT") {
            Ok(value) if !value.trim().is_empty() => value.trim().parse()?,
            _ => Environment::default(),
        };
        Ok(Self { environment })
    }

    /// Whether activation tokens are echoed back in the registration response.
    ///
    /// There is no mailer, so development deployments hand the token to the client.
    #[must_use]
    pub fn exposes_activation_token(&self) -> bool {
        self.environment == Environment::Development
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Uses trait objects so the backend selected by `RepositoryFactory` can be
/// swapped at runtime without touching the handlers.
#[derive(Clone)]
pub struct AppState {
    pub note_repository: Arc<dyn NoteRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub token_repository: Arc<dyn TokenRepository>,
    pub config: AppConfig,
}

impl AppState {
    #[must_use]
    pub fn with_config(repositories: Repositories, config: AppConfig) -> Self {
        Self {
            note_repository: repositories.note_repository,
            user_repository: repositories.user_repository,
            token_repository: repositories.token_repository,
            config,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// GET /v{1,2}/ping
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub ping: &'static str,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ping: "pong" })
}

// =============================================================================
// GET /v{1,2}/healthcheck
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub environment: Environment,
    pub version: &'static str,
}

/// Reports availability, the deployment environment and the service version.
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available",
        system_info: SystemInfo {
            environment: state.config.environment,
            version: VERSION,
        },
    })
}
