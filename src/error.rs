use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // All client-facing variants resolve to 400: "no data found" for an
        // unknown symbol is reported the same way as a malformed query, per
        // the documented GET /prices/latest/UNKNOWN example.
        let status = match &self {
            AppError::InvalidArgument(_)
            | AppError::InvalidMode(_)
            | AppError::NotFound(_)
            | AppError::Json(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Config(_)
            | AppError::Io(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
