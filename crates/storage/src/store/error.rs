#![forbid(unsafe_code)]

use mt_core::bounds::BoundError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Constraint(&'static str),
    RuntimeLimit(&'static str),
    InvalidInput(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Constraint(message) => write!(f, "constraint violation: {message}"),
            Self::RuntimeLimit(message) => write!(f, "runtime limit exceeded: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<BoundError> for StoreError {
    fn from(value: BoundError) -> Self {
        match value {
            BoundError::CodePointOverflow => {
                Self::RuntimeLimit("scan bound exceeds the maximum code point")
            }
        }
    }
}
