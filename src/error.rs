// src/error.rs
// Error types for the service surface.
// The numerical core never fails: degenerate physics shows up as NaN/∞ in a trajectory and is
// reported through its `IntegrationStatus`. Errors here cover request validation, configuration,
// rendering and the blocking-task plumbing of the HTTP layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for service operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur outside the numerical core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A request parameter is missing or out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The trajectory preview could not be drawn or encoded.
    #[error("render failed: {0}")]
    Render(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background computation did not complete.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SimError {
    #[must_use]
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::InvalidRequest(details.into())
    }

    #[must_use]
    pub fn render(details: impl Into<String>) -> Self {
        Self::Render(details.into())
    }

    #[must_use]
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }

    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal(details.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ResponseError for SimError {
    fn status_code(&self) -> StatusCode {
        match self {
            SimError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::invalid_request("l1 out of range");
        assert!(format!("{err}").contains("l1 out of range"));

        let err = SimError::render("buffer too small");
        assert!(format!("{err}").contains("buffer too small"));

        let err = SimError::config("bad port");
        assert!(format!("{err}").contains("bad port"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SimError::invalid_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SimError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
