//! Request-level error type, mapped onto plain-text HTTP responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file part")]
    MissingFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("File type '{0}' might not be supported.")]
    UnsupportedExtension(String),

    #[error("Empty file content")]
    EmptyUpload,

    #[error("Not a recognized RAW file: {0}")]
    ContainerOpen(String),

    #[error("No compatible preview available")]
    NoUsablePreview,

    #[error("Could not decode RAW file: {0}")]
    Decode(String),

    #[error("Could not encode JPEG: {0}")]
    Encode(String),

    #[error("RAW processing exceeded the {0}s limit")]
    Timeout(u64),

    #[error("Invalid multipart request: {0}")]
    Multipart(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFilePart
            | AppError::NoSelectedFile
            | AppError::UnsupportedExtension(_)
            | AppError::EmptyUpload
            | AppError::ContainerOpen(_)
            | AppError::NoUsablePreview
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Decode(_)
            | AppError::Encode(_)
            | AppError::Timeout(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Multipart(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!("request failed: {message}");
        }
        (status, message).into_response()
    }
}
