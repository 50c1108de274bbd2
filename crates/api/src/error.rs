//! API error types with HTTP response mapping.

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use services::ServiceError;

/// Body sent instead of the message of an unexpected error.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request carries no user identity.
    MissingIdentity,
    /// Bad request from the client.
    BadRequest(String),
    /// Workflow error.
    Service(ServiceError),
}

/// Detail of an unexpected error, attached to the response for the
/// development-mode middleware.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                "Missing X-User-Id header".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => return service_error_to_response(err),
        };
        error_body(status, &message)
    }
}

fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(errors) => {
            let body = serde_json::json!({ "errors": errors });
            (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
        }
        ServiceError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, &msg),
        ServiceError::Conflict(msg) => error_body(StatusCode::CONFLICT, &msg),
        ServiceError::Unauthorized(msg) => error_body(StatusCode::UNAUTHORIZED, &msg),
        ServiceError::Failure(msg) => error_body(StatusCode::UNPROCESSABLE_ENTITY, &msg),
        ServiceError::Unexpected(msg) => {
            tracing::error!(error = %msg, "internal server error");
            let mut response = error_body(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE);
            response.extensions_mut().insert(InternalErrorDetail(msg));
            response
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

/// Replaces the generic body of unexpected errors with their message.
///
/// Installed only in development.
pub async fn expose_internal_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(InternalErrorDetail(detail)) = response.extensions().get().cloned() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    let body = serde_json::json!({ "error": detail });
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.to_string()))
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<domain::repository::InvalidPageRequest> for ApiError {
    fn from(err: domain::repository::InvalidPageRequest) -> Self {
        ApiError::Service(err.into())
    }
}

impl From<common::MoneyError> for ApiError {
    fn from(err: common::MoneyError) -> Self {
        ApiError::Service(err.into())
    }
}
