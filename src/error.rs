//! Error types for the kanban service

use thiserror::Error;
use tonic::Status;

/// Result type for kanban operations
pub type Result<T> = std::result::Result<T, KanbanError>;

/// Errors that can occur in kanban operations
#[derive(Debug, Error)]
pub enum KanbanError {
    /// A board, column or task does not exist
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The request carries no user identity
    #[error("no authenticated user")]
    Unauthenticated,

    /// The row belongs to another user
    #[error("{resource} {id} belongs to another user")]
    PermissionDenied { resource: &'static str, id: String },

    /// The request is malformed or references rows outside its board
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Missing or malformed configuration
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("remote call failed: {0}")]
    Rpc(#[from] Status),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The auth service rejected the operation
    #[error("auth error: {message}")]
    Auth { message: String },
}

impl KanbanError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Whether the error means the requested row is gone.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Database(diesel::result::Error::NotFound) => true,
            Self::Rpc(status) => status.code() == tonic::Code::NotFound,
            _ => false,
        }
    }
}

impl From<KanbanError> for Status {
    fn from(err: KanbanError) -> Self {
        match err {
            KanbanError::NotFound { .. } => Status::not_found(err.to_string()),
            KanbanError::Database(diesel::result::Error::NotFound) => Status::not_found("Row not found"),
            KanbanError::Unauthenticated => Status::unauthenticated(err.to_string()),
            KanbanError::PermissionDenied { .. } => Status::permission_denied(err.to_string()),
            KanbanError::InvalidArgument { .. } => Status::invalid_argument(err.to_string()),
            KanbanError::Auth { .. } => Status::unauthenticated(err.to_string()),
            KanbanError::Rpc(status) => status,
            KanbanError::Database(_) | KanbanError::Pool(_) => {
                Status::unavailable("Database is unavailable")
            }
            other => Status::internal(other.to_string()),
        }
    }
}
