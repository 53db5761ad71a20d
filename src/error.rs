//! Error types for the storage engines and the transient store
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Constants ==
/// Message carried by every path validation failure.
pub const PATH_TRAVERSAL: &str = "Path traversal has been detected. Aborting.";

// == Store Error Enum ==
/// Unified error type for engines, the transient store and the HTTP layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Table name or primary key is not a single safe path segment
    #[error("{0}")]
    PathValidation(String),

    /// The engine has no record where one is required
    #[error("Record with primary key \"{key}\" not found in table \"{table}\"")]
    RecordNotFound { table: String, key: String },

    /// A live cache entry already occupies the key
    #[error(
        "Record with primary key \"{key}\" already exists in table \"{table}\" of database \"{store}\""
    )]
    RecordAlreadyExists {
        key: String,
        table: String,
        store: String,
    },

    /// Record or change set does not have the shape the operation needs
    #[error("Invalid record type: {0}")]
    RecordType(String),

    /// Store was used before a table name was bound
    #[error("No table bound to the store, call init first")]
    TableNotBound,

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Underlying storage failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Builds the path traversal variant with its canonical message.
    pub fn path_traversal() -> Self {
        StoreError::PathValidation(PATH_TRAVERSAL.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::PathValidation(_) | StoreError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            StoreError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::RecordAlreadyExists { .. } => StatusCode::CONFLICT,
            StoreError::RecordType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::TableNotBound | StoreError::Io(_) | StoreError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
