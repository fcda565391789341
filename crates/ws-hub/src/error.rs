use thiserror::Error;
use ws_store::StoreError;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The hub answered with something other than the accepted status
    #[error("Unexpected hub response: HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Challenge response did not match")]
    ChallengeMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HubError::Timeout(e.to_string())
        } else {
            HubError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
