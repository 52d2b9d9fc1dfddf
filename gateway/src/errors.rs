use crate::protocol::CallError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kvpool::StoreError;
use serde::Serialize;
use sessionfile::DecodeError;

/// Errors on the request path. Each maps to one HTTP status and is reported to
/// the client as `{"success": false, "message": ...}`.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid session file: {0}")]
    Parse(#[from] DecodeError),

    #[error("Session file too large")]
    UploadTooLarge,

    #[error("{0}")]
    Authentication(String),

    #[error("remote call failed: {0}")]
    Remote(#[from] CallError),

    #[error("storage backend error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Failing to spool the upload to disk is not the client's fault
            GatewayError::Parse(DecodeError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation(_) | GatewayError::Parse(_) => StatusCode::BAD_REQUEST,
            GatewayError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Remote(_) | GatewayError::Store(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Server side faults are not detailed.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Server error".to_string()
        } else {
            self.to_string()
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    success: bool,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(ApiErrorResponse {
            success: false,
            message: self.public_message(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Validation("Invalid input".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Parse(DecodeError::NoRows).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::UploadTooLarge.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            GatewayError::Authentication("Invalid session file".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Remote(CallError::Transient("reset".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::Store(StoreError::Backend("Unauthorized".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_are_not_detailed() {
        let err = GatewayError::Store(StoreError::Backend("WRONGPASS token abc".into()));
        assert_eq!(err.public_message(), "Server error");

        let err = GatewayError::Validation("Invalid .session file".into());
        assert_eq!(err.public_message(), "Invalid .session file");
    }
}
