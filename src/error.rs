use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::symmetry::BoundingBox;

/// Failures raised by the symmetry scorer. Only bad inputs end up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymmetryError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid bounding box {bbox} for a {width}x{height} image")]
    InvalidBoundingBox {
        bbox: BoundingBox,
        width: u32,
        height: u32,
    },
}

/// Failures talking to the hosted vision model.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited (429 RESOURCE_EXHAUSTED): {0}")]
    RateLimited(String),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No text in response")]
    EmptyResponse,
}

impl ServiceError {
    /// Builds the error for a non-success HTTP reply, singling out quota exhaustion.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            ServiceError::RateLimited(body)
        } else {
            ServiceError::Api { status, body }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited(_))
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("No image was uploaded")]
    MissingImage,

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Upload too large: {0}")]
    TooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SymmetryError> for AppError {
    fn from(error: SymmetryError) -> Self {
        match error {
            SymmetryError::InvalidImage(msg) => AppError::InvalidImage(msg),
            // The pipeline falls back to the full image, so a box error reaching
            // this point is a bug rather than bad input.
            other @ SymmetryError::InvalidBoundingBox { .. } => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::TooLarge(error.body_text())
        } else {
            AppError::Multipart(error.body_text())
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidImage(_) | AppError::MissingImage | AppError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("🔥 {}", self);
        } else {
            tracing::warn!("Rejected upload: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_classified_as_rate_limits() {
        assert!(ServiceError::from_status(429, "slow down".into()).is_rate_limited());
        assert!(ServiceError::from_status(400, r#"{"status":"RESOURCE_EXHAUSTED"}"#.into())
            .is_rate_limited());
        assert!(!ServiceError::from_status(500, "boom".into()).is_rate_limited());
    }

    #[test]
    fn invalid_image_maps_to_bad_request() {
        let err: AppError = SymmetryError::InvalidImage("empty".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingImage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
