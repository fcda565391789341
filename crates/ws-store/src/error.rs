use thiserror::Error;
use ws_common::SubscriptionState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Subscription not found: {0}")]
    NotFound(String),

    /// The persisted state was not in the allowed source set.
    /// `from` is the caller's snapshot, which may be stale.
    #[error("State conflict on subscription {id}: cannot move from {from} to {to}")]
    StateConflict {
        id: String,
        from: SubscriptionState,
        to: SubscriptionState,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::StateConflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
