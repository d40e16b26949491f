use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Why an inbound frame was rejected.  The frame is dropped as a whole.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, not an object, missing/unknown field, or a field of the wrong type.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Parsed fine but violates a field invariant (negative or non-finite).
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
