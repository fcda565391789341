use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use ws_store::StoreError;

/// Errors surfaced by the callback handlers
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Subscription not found: {0}")]
    NotFound(String),

    /// Tells the hub to stop delivering for this callback
    #[error("Subscription gone: {0}")]
    Gone(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Content-Length {declared} exceeds limit of {limit} bytes")]
    PayloadTooLarge { declared: usize, limit: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            CallbackError::Validation(_) => StatusCode::BAD_REQUEST,
            CallbackError::NotFound(_) => StatusCode::NOT_FOUND,
            CallbackError::Gone(_) => StatusCode::GONE,
            CallbackError::StateConflict(_) => StatusCode::BAD_REQUEST,
            CallbackError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CallbackError::Transport(_) => StatusCode::BAD_REQUEST,
            CallbackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Validation(_) => "validation",
            CallbackError::NotFound(_) => "not_found",
            CallbackError::Gone(_) => "gone",
            CallbackError::StateConflict(_) => "state_conflict",
            CallbackError::PayloadTooLarge { .. } => "too_large",
            CallbackError::Transport(_) => "transport",
            CallbackError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for CallbackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CallbackError::NotFound(id),
            e @ StoreError::StateConflict { .. } => CallbackError::StateConflict(e.to_string()),
            e => CallbackError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store details stay in the logs
        let body = match &self {
            CallbackError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ws_common::SubscriptionState;

    #[test]
    fn test_store_errors_map_to_status() {
        let not_found: CallbackError = StoreError::NotFound("x".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict: CallbackError = StoreError::StateConflict {
            id: "x".to_string(),
            from: SubscriptionState::Denied,
            to: SubscriptionState::Subscribed,
        }
        .into();
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);

        let db: CallbackError = StoreError::Database("disk I/O error".to_string()).into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_transport_and_size_statuses() {
        assert_eq!(CallbackError::Transport("short read".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            CallbackError::PayloadTooLarge { declared: 10, limit: 5 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(CallbackError::Gone("x".into()).status(), StatusCode::GONE);
    }
}
