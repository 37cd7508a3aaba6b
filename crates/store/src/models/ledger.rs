//! Per-user session token ledger.
//!
//! The ledger is a bounded FIFO of salted token hashes, persisted in
//! `Users.session_tokens` as a JSON array of `[hash, salt]` pairs, oldest
//! first. Raw tokens are handed out once by [`SessionLedger::issue`] and never
//! stored.

use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::crypto::{self, SESSION_TOKEN_LENGTH, TOKEN_SALT_LENGTH};
use crate::error::{ErrorKind, Result};

/// Maximum number of live sessions per user.
pub const MAX_TOKENS_PER_USER: usize = 20;

/// Verifiable proof of one issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct TokenEntry {
    pub hash: String,
    pub salt: String,
}
impl From<(String, String)> for TokenEntry {
    fn from((hash, salt): (String, String)) -> Self {
        Self { hash, salt }
    }
}
impl From<TokenEntry> for (String, String) {
    fn from(entry: TokenEntry) -> Self {
        (entry.hash, entry.salt)
    }
}
impl TokenEntry {
    fn matches(&self, token: &str) -> bool {
        crypto::hashes_match(&crypto::hash_token(token, &self.salt), &self.hash)
    }
}

/// Bounded, insertion-ordered set of session token entries.
///
/// Invariant: never holds more than [`MAX_TOKENS_PER_USER`] entries. Eviction
/// is by issue order only; verifying a token does not refresh it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLedger {
    entries: VecDeque<TokenEntry>,
}

impl SessionLedger {
    /// Decode the persisted column value.
    ///
    /// An empty string (or JSON `null`) is an empty ledger. A stored list
    /// longer than the capacity keeps only its newest entries.
    pub fn decode(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<VecDeque<TokenEntry>> =
            serde_json::from_str(raw).or_raise(|| ErrorKind::InvalidData("session tokens"))?;
        let mut entries = entries.unwrap_or_default();
        while entries.len() > MAX_TOKENS_PER_USER {
            entries.pop_front();
        }
        Ok(Self { entries })
    }

    /// Encode for the `session_tokens` column.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(&self.entries).or_raise(|| ErrorKind::InvalidData("session tokens"))
    }

    /// Mint a new token, record its salted hash and return the raw token.
    ///
    /// When the ledger is full the single oldest entry is evicted first.
    pub fn issue(&mut self) -> String {
        let token = crypto::random_string(SESSION_TOKEN_LENGTH);
        let salt = crypto::random_string(TOKEN_SALT_LENGTH);
        let hash = crypto::hash_token(&token, &salt);
        while self.entries.len() >= MAX_TOKENS_PER_USER {
            self.entries.pop_front();
        }
        self.entries.push_back(TokenEntry { hash, salt });
        token
    }

    /// Whether `token` was issued by this ledger and is still live.
    pub fn contains(&self, token: &str) -> bool {
        self.position(token).is_some()
    }

    /// Revoke `token`, returning its entry, or `None` if it is not live.
    /// The ledger is untouched when nothing matches.
    pub fn remove(&mut self, token: &str) -> Option<TokenEntry> {
        let index = self.position(token)?;
        self.entries.remove(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TokenEntry> {
        self.entries.iter()
    }

    fn position(&self, token: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.matches(token))
    }
}
