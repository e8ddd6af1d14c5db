use thiserror::Error;

/// Error codes surfaced by the (out-of-scope) configuration-document parser.
///
/// The engine itself only ever constructs [`ConfigError::BadValue`],
/// [`ConfigError::OutOfRange`] and [`ConfigError::BadArgument`] — the other
/// variants exist so this type is a drop-in target for a schema-validation
/// layer built on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    TypeError,
    OutOfRange,
    BadValue,
    BadArgument,
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::TypeError => "TYPE_ERROR",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::BadValue => "BAD_VALUE",
            ErrorCode::BadArgument => "BAD_ARGUMENT",
            ErrorCode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A construction/runtime error, keyed to the configuration-document path it
/// originates from.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code} at `{key}`: {message}")]
pub struct ConfigError {
    pub code: ErrorCode,
    pub key: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(code: ErrorCode, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn bad_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadValue, key, message)
    }

    pub fn out_of_range(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfRange, key, message)
    }

    pub fn bad_argument(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadArgument, key, message)
    }
}

/// Errors from rank arithmetic (`core::rank`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankError {
    #[error("rank {rank} exceeds num_permutations {max}")]
    BadRange { rank: String, max: String },
    #[error("candidate multiset does not match template multiset")]
    MultisetMismatch,
}

/// Errors surfaced by [`crate::io::binary`] (de)serialization.
#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("bincode encode/decode failure: {0}")]
    Codec(#[from] bincode::Error),
    #[error("corrupt payload: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
