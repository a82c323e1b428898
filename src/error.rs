use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepinError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Feed parsing failed: {0}")]
    FeedParsing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepinError>;
