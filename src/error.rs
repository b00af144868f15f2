// Portal error types
use thiserror::Error;

/// Errors surfaced by the portal core.
///
/// Failures that only affect a derived convenience value (favorites
/// normalization, a single storage write) are recovered where they happen and
/// never reach this type. Everything here is something a caller must react to.
#[derive(Debug, Error)]
pub enum PortalError {
    // Caller should redirect to the login entry point
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Data store error: {0}")]
    DataStore(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("E-mail ou senha inválidos.")]
    InvalidCredentials,

    #[error("Invalid access token: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        PortalError::Forbidden(message.into())
    }

    pub fn data_store(message: impl Into<String>) -> Self {
        PortalError::DataStore(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        PortalError::Storage(message.into())
    }

    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        PortalError::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        PortalError::InvalidInput(message.into())
    }

    /// Stable code for JSON output and log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            PortalError::Unauthenticated => "UNAUTHENTICATED",
            PortalError::Forbidden(_) => "FORBIDDEN",
            PortalError::DataStore(_) => "DATA_STORE_ERROR",
            PortalError::Storage(_) => "STORAGE_ERROR",
            PortalError::Backend { .. } => "BACKEND_ERROR",
            PortalError::Timeout(_) => "TIMEOUT",
            PortalError::InvalidCatalog(_) => "INVALID_CATALOG",
            PortalError::InvalidInput(_) => "INVALID_INPUT",
            PortalError::InvalidCredentials => "INVALID_CREDENTIALS",
            PortalError::Token(_) => "INVALID_TOKEN",
            PortalError::Config(_) => "CONFIG_ERROR",
            PortalError::Http(_) => "HTTP_ERROR",
            PortalError::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether the UI should offer a retry affordance
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PortalError::DataStore(_)
                | PortalError::Timeout(_)
                | PortalError::Http(_)
                | PortalError::Backend { status: 500..=599, .. }
        )
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
