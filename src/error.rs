use thiserror::Error;

/// Errors from the ask endpoint
#[derive(Debug, Error)]
pub enum AskError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}
