//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A config error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not find config.json in any of: {}", display_paths(_0))]
    NotFound(#[error(not(source))] Vec<PathBuf>),
    #[display("failed to read config file `{}`", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("unclosed comment in config file")]
    UnclosedComment,
    #[display("failed to decode config file")]
    Parse,
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| format!("`{}`", p.display())).collect::<Vec<_>>().join(", ")
}
