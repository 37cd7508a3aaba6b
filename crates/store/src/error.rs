//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Two families live in the same enum: the typed kinds that a request layer
//! reports back to the client verbatim (each with a stable numeric code), and
//! the unclassified kinds raised by the storage layer itself. The latter must
//! never reach a client in detail, see [`Failure`].

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Code reported for every unclassified failure.
pub const INTERNAL_ERROR_CODE: i32 = -1;
/// Message reported for every unclassified failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("Invalid database metadata")]
    InvalidMetadata,
    #[display("Invalid database schema")]
    InvalidSchema,
    #[display("User already exists in database")]
    ExistentUser,
    #[display("User does not exist in database")]
    InexistentUser,
    #[display("Invalid password")]
    InvalidPassword,
    #[display("Disallowed username")]
    DisallowedUsername,
    #[display("Disallowed password")]
    DisallowedPassword,
    #[display("Invalid token")]
    InvalidToken,
    #[display("Invalid page number")]
    InvalidPageNumber,
    #[display("Invalid ID")]
    InvalidId,
    #[display("Unauthorized")]
    Unauthorized,
    #[display("Invalid page size")]
    InvalidPageSize,

    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A stored value could not be encoded or decoded.
    #[display("invalid data in store: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Password hashing failed or its worker could not be joined.
    #[display("password hashing error")]
    Hashing,
}

impl ErrorKind {
    /// Stable numeric code of a typed kind, `None` for unclassified failures.
    ///
    /// These codes are part of the wire contract: never renumber them.
    pub fn code(&self) -> Option<i32> {
        Some(match self {
            Self::InvalidMetadata => 1,
            Self::InvalidSchema => 2,
            Self::ExistentUser => 3,
            Self::InexistentUser => 4,
            Self::InvalidPassword => 5,
            Self::DisallowedUsername => 6,
            Self::DisallowedPassword => 7,
            Self::InvalidToken => 8,
            Self::InvalidPageNumber => 9,
            Self::InvalidId => 10,
            Self::Unauthorized => 11,
            Self::InvalidPageSize => 12,
            Self::Database | Self::Migration | Self::InvalidData(_) | Self::Hashing => return None,
        })
    }

    /// Returns `true` for validation and authorization outcomes that are
    /// meant to be shown to the caller.
    pub fn is_typed(&self) -> bool {
        self.code().is_some()
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// The client-facing view of an error.
///
/// Typed kinds keep their code and message; everything else collapses to a
/// single generic failure so storage internals never leak.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Failure {
    pub code: i32,
    pub message: String,
}
impl From<&ErrorKind> for Failure {
    fn from(kind: &ErrorKind) -> Self {
        match kind.code() {
            Some(code) => Self { code, message: kind.to_string() },
            None => Self {
                code: INTERNAL_ERROR_CODE,
                message: INTERNAL_ERROR_MESSAGE.to_string(),
            },
        }
    }
}

/// Log an error with its full tree (including raise locations) and return
/// what may be shown to the client.
#[track_caller]
pub fn report(err: &Error) -> Failure {
    let caller = std::panic::Location::caller();
    let kind: &ErrorKind = err;
    if kind.is_typed() {
        tracing::debug!(%caller, "{kind}");
    } else {
        tracing::error!(%caller, "{err:?}");
    }
    Failure::from(kind)
}
