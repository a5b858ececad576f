use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for Tapfolio core operations.
///
/// Every variant carries a stable machine-readable code and maps to an
/// HTTP status so the HTTP layer can translate errors 1:1.
#[derive(Debug, thiserror::Error)]
pub enum TapfolioError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Trial has expired; the card is locked for writes")]
    TrialExpired,

    #[error("Invalid card reference: {0}")]
    InvalidCard(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response format for API errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl TapfolioError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invalid_card(msg: impl Into<String>) -> Self {
        Self::InvalidCard(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable code string for this error, suitable for client-side matching.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::TrialExpired => "TRIAL_EXPIRED",
            Self::InvalidCard(_) => "INVALID_CARD",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) | Self::Anyhow(_) => "INTERNAL",
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::InvalidCard(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::TrialExpired => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a message suitable for client responses in production.
    ///
    /// Client errors (4xx) expose their message. Server errors (5xx) return
    /// a generic message to prevent information disclosure (CWE-209); full
    /// details are logged server-side only.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_)
            | Self::BadRequest(_)
            | Self::Unauthorized(_)
            | Self::TrialExpired
            | Self::InvalidCard(_)
            | Self::Conflict(_) => self.to_string(),

            Self::Storage(_) => "Object storage error".to_string(),
            Self::Internal(_) | Self::Anyhow(_) => "Internal error".to_string(),
        }
    }
}

impl IntoResponse for TapfolioError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!(
            status = status.as_u16(),
            code = self.code(),
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            code: self.code(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for Tapfolio core operations.
pub type Result<T> = std::result::Result<T, TapfolioError>;
