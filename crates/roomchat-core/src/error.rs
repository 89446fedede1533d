use thiserror::Error;

/// Errors produced by the roomchat protocol layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("connection failed: {0}")]
    ConnectFailure(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not connected")]
    NotConnected,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Codec(e.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
