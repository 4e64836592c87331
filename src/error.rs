use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::query::ParseErrors;
use crate::store::StoreError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// One or more malformed query parameters
    InvalidQuery(ParseErrors),
    /// Log store failure, with the operation and locator that failed
    Store { context: String, source: StoreError },
    /// The request did not finish within its deadline
    Timeout(Duration),
    /// Pagination links could not be built
    Pagination(String),
    /// Internal server error
    InternalError(String),
}

impl AppError {
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Store { source, .. } => match source {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                StoreError::Internal(_) | StoreError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Pagination(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuery(errors) => write!(f, "Invalid query: {}", errors),
            Self::Store { context, source } => write!(f, "{}: {}", context, source),
            Self::Timeout(limit) => {
                write!(f, "Request did not complete within {}s", limit.as_secs_f64())
            }
            Self::Pagination(msg) => write!(f, "Problem setting response pages: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidQuery(errors) => Some(errors),
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut error = json!({
            "message": self.to_string(),
            "type": error_type_name(&self),
        });
        if let Self::InvalidQuery(errors) = &self {
            error["details"] = json!(errors.errors());
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidQuery(_) => "invalid_query",
        AppError::Store { .. } => "store_error",
        AppError::Timeout(_) => "timeout",
        AppError::Pagination(_) => "pagination_error",
        AppError::InternalError(_) => "internal_error",
    }
}

impl From<ParseErrors> for AppError {
    fn from(errors: ParseErrors) -> Self {
        Self::InvalidQuery(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{resolve, Locator, QueryParams, RequestShape};
    use chrono::Utc;

    fn parse_errors() -> ParseErrors {
        let params: QueryParams = [("limit", "x"), ("start", "y")].into_iter().collect();
        resolve(RequestShape::ById, Locator::by_id("a"), &params, Utc::now()).unwrap_err()
    }

    #[test]
    fn test_error_display() {
        let error = AppError::store(
            "Error getting log by id 'abc'",
            StoreError::Internal("db down".to_string()),
        );
        assert_eq!(error.to_string(), "Error getting log by id 'abc': store error: db down");

        let error = AppError::Timeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "Request did not complete within 30s");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name(&AppError::Timeout(Duration::from_secs(1))), "timeout");
        assert_eq!(error_type_name(&AppError::Pagination("x".to_string())), "pagination_error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidQuery(parse_errors()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::store("ctx", StoreError::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::store("ctx", StoreError::Internal("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::store("ctx", StoreError::Timeout("x".into())).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Timeout(Duration::from_secs(60)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Pagination("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_invalid_query_response_lists_every_parameter() {
        let response = AppError::from(parse_errors()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["type"], "invalid_query");
        let details = body["error"]["details"].as_array().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["param"], "start");
        assert_eq!(details[1]["param"], "limit");
    }
}
