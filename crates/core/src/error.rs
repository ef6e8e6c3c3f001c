use thiserror::Error;

/// Errors raised by core domain parsing and validation.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Structured output unrecoverable: {0}")]
    Unparsable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
