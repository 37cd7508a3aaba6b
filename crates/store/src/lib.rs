//! SQLite metadata store for the hv doujin library.
//!
//! This crate owns the on-disk schema and every operation that touches it:
//! - **Users**: registration, password login, and a bounded ledger of salted
//!   session token hashes per user (see [`SessionLedger`]).
//! - **Doujins**: the catalogue with its pages, tag-filtered paginated search
//!   and the transactional write side used by imports.
//! - **Tag sets**: per-user saved searches.
//!
//! Every read or write on behalf of a client requires an [`Authenticated`],
//! obtained from [`UserRepository::authenticate`].

mod crypto;
mod db;
pub mod error;
mod models;
mod repo;
pub mod search;

pub use crate::crypto::PasswordParams;
pub use crate::db::Database;
pub use crate::models::{Doujin, MAX_TOKENS_PER_USER, NewDoujin, PageRef, SessionLedger, TagSet, TokenEntry};
pub use crate::repo::{
    Authenticated, Credentials, DoujinImport, DoujinRepository, TagSetRepository, UserRepository,
    is_password_allowed, is_username_allowed,
};
pub use crate::search::{SearchQuery, SearchResult};
