//! Chat client errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    /// 401/403 from the provider
    #[error("provider rejected the API key")]
    Unauthorized,

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Any other non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The reply carried no choices
    #[error("provider reply had no choices")]
    NoChoices,

    #[error("could not decode provider reply: {0}")]
    Decode(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// Map a failed HTTP status to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited(body),
            _ => Self::Status { status, body },
        }
    }
}
