//! Error kinds for the SAXS core, per spec.md §7.
//!
//! Parse and I/O errors are the caller's responsibility (we only produce
//! them for the one piece of file I/O in scope here, the `.dat` settings
//! format); everything else originates inside this crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaxsError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("bad range: {0}")]
    BadRange(String),

    #[error("size error: {0}")]
    Size(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, SaxsError>;
