//! Password and session token hashing.
//!
//! Every secret derivative persisted by the store is URL-safe base64 text
//! (with padding) so that databases written by earlier releases keep
//! verifying.

use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64Url, Encoding};
use exn::ResultExt;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{ErrorKind, Result};

/// Random bytes behind a password salt.
pub const PASSWORD_SALT_LENGTH: usize = 16;
/// Random bytes behind a session token salt.
pub const TOKEN_SALT_LENGTH: usize = 16;
/// Random bytes behind a session token (40 characters once encoded).
pub const SESSION_TOKEN_LENGTH: usize = 30;
/// Length of the derived password key in bytes.
pub const PASSWORD_HASH_LENGTH: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}
impl Default for PasswordParams {
    fn default() -> Self {
        Self { iterations: 3, memory_kib: 64 * 1024, parallelism: 4 }
    }
}
impl PasswordParams {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(PASSWORD_HASH_LENGTH))
            .or_raise(|| ErrorKind::Hashing)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// `len` bytes from the OS random source, URL-safe base64 encoded.
pub fn random_string(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    Base64Url::encode_string(&bytes)
}

/// Derive the stored hash of a password.
///
/// The salt is used as the bytes of its encoded text, not decoded.
/// This is CPU and memory heavy; async callers go through
/// [`hash_password_blocking`].
pub fn hash_password(params: PasswordParams, password: &str, salt: &str) -> Result<String> {
    let mut out = [0u8; PASSWORD_HASH_LENGTH];
    params
        .hasher()?
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut out)
        .or_raise(|| ErrorKind::Hashing)?;
    Ok(Base64Url::encode_string(&out))
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_blocking(params: PasswordParams, password: &str, salt: &str) -> Result<String> {
    let (password, salt) = (password.to_owned(), salt.to_owned());
    tokio::task::spawn_blocking(move || hash_password(params, &password, &salt))
        .await
        .or_raise(|| ErrorKind::Hashing)?
}

/// Hash of a raw session token with its per-entry salt.
pub fn hash_token(token: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(salt.as_bytes());
    Base64Url::encode_string(&hasher.finalize())
}

/// Compare two encoded hashes without short-circuiting on the first
/// differing byte.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
pub(crate) const TEST_PARAMS: PasswordParams = PasswordParams { iterations: 1, memory_kib: 8, parallelism: 1 };
