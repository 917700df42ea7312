pub mod gate;
pub mod grid;
pub mod session;
pub mod storage;
pub mod verifier;

pub use session::{
    LoginResult, PredictionOutcome, ResumeResult, Session, SessionConfig, SessionState,
};
pub use storage::{FileStorage, MemoryStorage, UnlockStorage};
pub use verifier::{HttpVerifier, Verify};

use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt stored state: {0}")]
    CorruptState(#[from] serde_json::Error),
    #[error("not logged in")]
    NotLoggedIn,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
