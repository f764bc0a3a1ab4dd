use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid output style: {0}")]
    InvalidOutputStyle(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
