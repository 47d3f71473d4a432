use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ApiResponse;

/// Errors surfaced by the prediction path.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    /// The serialized model could not be located or deserialized.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    /// Input outside the accepted bounds, or not parseable at all.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The model was loaded but the inference call itself failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(&self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::ModelUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Inference("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_names_the_kind() {
        let err = AppError::ModelUnavailable("diabetes_model.json: not found".into());
        assert_eq!(err.to_string(), "model unavailable: diabetes_model.json: not found");
    }
}
