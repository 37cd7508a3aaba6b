//! Library Error Types
//!
//! Import failures are [`exn`] trees: the kinds below sit on top, with the
//! underlying I/O, JSON or store error kept as the cause.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid metadata file `{}`", _0.display())]
    Metadata(#[error(not(source))] PathBuf),
    #[display("failed to read `{}`", _0.display())]
    Io(#[error(not(source))] PathBuf),
    #[display("metadata store operation failed")]
    Store,
    #[display("Some pages are missing in the folder (found {found} out of {expected})")]
    MissingPages { found: usize, expected: u32 },
    #[display("The folder contains too many pages (found {found} out of {expected})")]
    TooManyPages { found: usize, expected: u32 },
    #[display("The pages in the folder are not sequential (expected page {expected}, found {found})")]
    NonSequentialPages { expected: u32, found: u32 },
    #[display("failed to import doujin in folder `{}`", _0.display())]
    Folder(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
