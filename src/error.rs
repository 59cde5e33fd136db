//! Error handling

use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use crate::constants::PERSISTENCE_FAILURE_MESSAGE;
use crate::history::PersistenceError;
use crate::resize::ResizeError;
use crate::shoot::GenerationError;

/// definitions for the photoshoot application.
#[derive(Debug)]
pub enum PhotoShootError {
    /// Missing inputs, or a generation is already running
    InputValidation(String),
    /// The describe or an edit call failed
    RemoteCall(GenerationError),
    /// Downscaling for history failed
    Resize(ResizeError),
    /// The history write failed
    Persistence(PersistenceError),
    /// When a requested resource is not found
    NotFound(String),
    /// When you didn't do the right thing
    BadRequest,
    /// Missing or invalid CSRF token
    Unauthorized,
    /// The controller is held by a running generation
    Busy,
    /// When DB operations fail
    DatabaseError(sea_orm::DbErr),
    /// When an internal server error occurs
    InternalServerError(String),
}

/// Coarse error category kept alongside the message shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inputs incomplete or busy
    InputValidation,
    /// Generation failed
    RemoteCall,
    /// Generation worked, saving it didn't
    Resize,
    /// History write failed
    Persistence,
    /// Anything else
    Other,
}

impl std::fmt::Display for PhotoShootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputValidation(message) => f.write_str(message),
            Self::RemoteCall(err) => write!(f, "{err}"),
            Self::Resize(err) => write!(f, "Failed to resize images for history: {err}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::BadRequest => f.write_str("Bad request"),
            Self::Unauthorized => f.write_str("Invalid or missing session"),
            Self::Busy => f.write_str("A photo shoot is already being generated"),
            Self::DatabaseError(err) => write!(f, "Database error: {err}"),
            Self::InternalServerError(message) => write!(f, "Internal server error: {message}"),
        }
    }
}

impl std::error::Error for PhotoShootError {}

impl PhotoShootError {
    /// Category for the error panel.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation(_) | Self::Busy => ErrorKind::InputValidation,
            Self::RemoteCall(_) => ErrorKind::RemoteCall,
            Self::Resize(_) => ErrorKind::Resize,
            Self::Persistence(_) => ErrorKind::Persistence,
            _ => ErrorKind::Other,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Persistence(_) => PERSISTENCE_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<GenerationError> for PhotoShootError {
    fn from(err: GenerationError) -> Self {
        PhotoShootError::RemoteCall(err)
    }
}

impl From<ResizeError> for PhotoShootError {
    fn from(err: ResizeError) -> Self {
        PhotoShootError::Resize(err)
    }
}

impl From<PersistenceError> for PhotoShootError {
    fn from(err: PersistenceError) -> Self {
        PhotoShootError::Persistence(err)
    }
}

impl From<sea_orm::DbErr> for PhotoShootError {
    fn from(err: sea_orm::DbErr) -> Self {
        PhotoShootError::DatabaseError(err)
    }
}

impl From<std::io::Error> for PhotoShootError {
    fn from(err: std::io::Error) -> Self {
        PhotoShootError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for PhotoShootError {
    fn from(err: axum::http::Error) -> Self {
        PhotoShootError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for PhotoShootError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            PhotoShootError::InputValidation(message) => {
                info!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message.clone())
            }
            PhotoShootError::BadRequest => {
                info!("Bad request received");
                (StatusCode::BAD_REQUEST, "Bad Request".to_string())
            }
            PhotoShootError::Unauthorized => {
                info!("Unauthorized request received");
                (
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized: invalid or missing session.".to_string(),
                )
            }
            PhotoShootError::Busy => {
                info!("Request rejected while generating");
                (StatusCode::CONFLICT, self.to_string())
            }
            PhotoShootError::NotFound(what) => {
                tracing::error!("404 {what}");
                (StatusCode::NOT_FOUND, "Not Found".to_string())
            }
            PhotoShootError::RemoteCall(err) => {
                tracing::error!("Generation error: {}", err);
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            PhotoShootError::DatabaseError(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            PhotoShootError::Resize(_)
            | PhotoShootError::Persistence(_)
            | PhotoShootError::InternalServerError(_) => {
                tracing::error!("Internal server error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, body).into_response()
    }
}
