use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Which uniqueness rule a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    SlotAlreadyBooked,
    SequenceRace,
    ReferenceTaken,
    ConcurrentUpdate,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::SlotAlreadyBooked => write!(f, "slot already booked"),
            ConflictKind::SequenceRace => write!(f, "sequence race"),
            ConflictKind::ReferenceTaken => write!(f, "reference number already in use"),
            ConflictKind::ConcurrentUpdate => write!(f, "appointment modified concurrently"),
        }
    }
}

/// Failure taxonomy shared by the availability store, slot generator and ledger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictKind),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    /// Conflicts mean "pick another slot" or "try the write again", never a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulingError::Conflict(_))
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        SchedulingError::NotFound(entity.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SchedulingError::Configuration(message.into())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound(_) => AppError::NotFound(err.to_string()),
            SchedulingError::Conflict(kind) => AppError::Conflict(kind.to_string()),
            SchedulingError::Configuration(msg) => AppError::ValidationError(msg),
            SchedulingError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
            SchedulingError::Storage(msg) => AppError::Database(msg),
        }
    }
}
