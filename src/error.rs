use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a catalog document could not be turned into a list of examples.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog not readable at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Catalog has the wrong shape: {0}")]
    Shape(String),
}

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding model failed to load: {0}")]
    ModelLoad(String),

    #[error("Unsupported embedding model: {0}")]
    UnsupportedModel(String),

    #[error("Embedding failed: {0}")]
    Inference(String),

    #[error("Embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedder returned zero-dimensional vectors")]
    ZeroDimension,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
