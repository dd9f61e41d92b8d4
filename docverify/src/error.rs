use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned to clients for every downstream failure. The underlying
/// cause travels in the `details` field.
pub const PROCESSING_FAILED: &str = "Failed to process document";

/// Error body. `details` is present on 500 responses only.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Error, Debug)]
pub enum DocVerifyError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported file type")]
    UnsupportedMediaType(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DocVerifyError {
    /// Client errors are detected before any external call is made.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DocVerifyError::Validation(_) | DocVerifyError::UnsupportedMediaType(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for DocVerifyError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            DocVerifyError::Validation(msg) => ErrorBody {
                error: msg.clone(),
                details: None,
            },
            DocVerifyError::UnsupportedMediaType(mime) => {
                tracing::debug!(%mime, "Rejected unsupported media type");
                ErrorBody {
                    error: self.to_string(),
                    details: None,
                }
            }
            _ => {
                tracing::error!(error = %self, "Document processing failed");
                ErrorBody {
                    error: PROCESSING_FAILED.to_string(),
                    details: Some(self.to_string()),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DocVerifyError>;
