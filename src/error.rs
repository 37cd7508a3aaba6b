//! Binary Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("failed to load configuration")]
    Config,
    #[display("failed to open database `{}`", _0.display())]
    Database(#[error(not(source))] PathBuf),
    #[display("failed to register doujin in folder `{}`", _0.display())]
    Import(#[error(not(source))] PathBuf),
    #[display("failed to register user `{_0}`")]
    Register(#[error(not(source))] String),
}
