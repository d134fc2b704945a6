use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use storefront_types::ports::RepoError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Product {0} is out of stock")]
    OutOfStock(Uuid),

    /// The backing store failed. The request can be retried as is.
    #[error("{0}")]
    Store(#[from] RepoError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn retryable(&self) -> bool {
        matches!(self, AppError::Store(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::OutOfStock(_) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let msg = match &self {
            AppError::BadRequest(m) | AppError::Unauthorized(m) | AppError::NotFound(m) => {
                m.clone()
            }
            AppError::OutOfStock(_) => self.to_string(),
            AppError::Store(e) => {
                tracing::warn!(error = %e, "store error");
                e.to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "internal error".into()
            }
        };

        let body = serde_json::to_string(&ErrorBody {
            error: msg,
            retryable: self.retryable(),
        })
        .unwrap_or_else(|_| "{\"error\":\"internal serialization\",\"retryable\":false}".into());
        (self.status(), [("content-type", "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Store(RepoError::DbError("x".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::OutOfStock(Uuid::nil()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn only_store_errors_are_retryable() {
        assert!(AppError::Store(RepoError::DbError("locked".into())).retryable());
        assert!(!AppError::NotFound("order".into()).retryable());
        assert!(!AppError::Internal(anyhow::anyhow!("boom")).retryable());
    }

    #[test]
    fn store_message_passes_through() {
        let err = AppError::Store(RepoError::DbError("database is locked".into()));
        assert_eq!(err.to_string(), "db error: database is locked");
    }
}
