//! HTTP rendering of [`CommerceError`].
//!
//! Every failure is returned as `{"success": false, "message": ...}`.
//! Internal errors are logged here and the client gets a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::CommerceError;

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CommerceError::Validation(msg) | CommerceError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CommerceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CommerceError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            CommerceError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            CommerceError::InsufficientBalance => (StatusCode::BAD_REQUEST, self.to_string()),
            CommerceError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again".to_string())
            }
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CommerceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CommerceError::BadRequest("no".into()), StatusCode::BAD_REQUEST),
            (CommerceError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (CommerceError::Conflict("used".into()), StatusCode::CONFLICT),
            (CommerceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (CommerceError::InsufficientBalance, StatusCode::BAD_REQUEST),
            (CommerceError::Internal("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
