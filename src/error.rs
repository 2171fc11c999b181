use thiserror::Error;

use crate::keys::KeyError;
use crate::refn::RefnError;
use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum KindredError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Structural error: {0}")]
    Structural(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Record error: {0}")]
    Record(String),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Refn error: {0}")]
    Refn(#[from] RefnError),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, KindredError>;

// Helper conversions
impl From<rusqlite::Error> for KindredError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for KindredError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
