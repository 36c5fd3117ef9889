use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use killfeed_application::AppError;

#[derive(Debug)]
pub enum HttpError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Timeout(String),
    Upstream(String),
    Internal(String),
}

impl From<AppError> for HttpError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::BadRequest(msg) => HttpError::BadRequest(msg),
            AppError::NotFound(msg) => HttpError::NotFound(msg),
            AppError::Conflict(msg) => HttpError::Conflict(msg),
            AppError::Timeout(msg) => HttpError::Timeout(msg),
            AppError::Source(err) if err.is_terminal() => HttpError::BadRequest(err.to_string()),
            AppError::Source(err) => HttpError::Upstream(err.to_string()),
            AppError::Internal(err) => HttpError::Internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, format!("bad request: {}", msg)),
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("not found: {}", msg)),
            HttpError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            HttpError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            HttpError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use killfeed_domain::SourceError;

    #[test]
    fn app_errors_map_to_statuses() {
        let status = |err: AppError| HttpError::from(err).into_response().status();
        assert_eq!(status(AppError::Conflict("busy".into())), StatusCode::CONFLICT);
        assert_eq!(status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AppError::Source(SourceError::Authentication("denied".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AppError::Source(SourceError::Connection("reset".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(AppError::Timeout("slow".into())), StatusCode::GATEWAY_TIMEOUT);
    }
}
