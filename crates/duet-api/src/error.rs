use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use duet_core::DmError;
use duet_types::api::ErrorResponse;
use tracing::warn;

/// `DmError` as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DmError);

impl From<DmError> for ApiError {
    fn from(err: DmError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &DmError) -> StatusCode {
    match err {
        DmError::InvalidParticipants | DmError::EmptyBody | DmError::BodyTooLong { .. } => {
            StatusCode::BAD_REQUEST
        }
        DmError::NotAParticipant => StatusCode::FORBIDDEN,
        DmError::ConversationNotFound => StatusCode::NOT_FOUND,
        DmError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let retryable = self.0.is_retryable();

        let message = if retryable {
            warn!("Storage unavailable: {}", self.0);
            // Don't leak SQLite internals to clients
            "storage is temporarily unavailable, try again".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(ErrorResponse {
            error: self.0.kind().to_string(),
            message,
            retryable,
        });

        let mut response = (status, body).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_map_to_client_statuses() {
        assert_eq!(status_for(&DmError::InvalidParticipants), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&DmError::EmptyBody), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&DmError::NotAParticipant), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&DmError::ConversationNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_errors_ask_for_retry() {
        let response = ApiError(DmError::storage("database is locked")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }
}
