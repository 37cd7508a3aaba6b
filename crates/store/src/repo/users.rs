//! Credential store: registration, login/logout and the authentication gate.

use exn::{OptionExt, ResultExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::Database;
use crate::crypto::{self, PASSWORD_SALT_LENGTH, PasswordParams};
use crate::error::{ErrorKind, Result};
use crate::models::SessionLedger;

/// The `(username, token)` pair a client presents on every request.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).finish_non_exhaustive()
    }
}
impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self { username: username.into(), token: token.into() }
    }
}

/// Proof that a request carried a live session.
///
/// Only [`UserRepository::authenticate`] can construct one, so every
/// operation taking `&Authenticated` is gated by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated {
    user_id: i64,
}
impl Authenticated {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// ASCII letters, digits, `.`, `_` and `-`, at least one character.
pub fn is_username_allowed(username: &str) -> bool {
    !username.is_empty() && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn is_password_allowed(password: &str) -> bool {
    !password.is_empty()
}

/// Repository for `Users` rows and their session ledgers.
///
/// Usernames are matched case-insensitively everywhere but returned as
/// stored.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    password: PasswordParams,
}
impl From<&Database> for UserRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), password: db.password_params() }
    }
}
impl UserRepository {
    /// Create a user with an empty session ledger.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        if !is_username_allowed(username) {
            exn::bail!(ErrorKind::DisallowedUsername);
        }
        if !is_password_allowed(password) {
            exn::bail!(ErrorKind::DisallowedPassword);
        }
        let existing: Option<i64> = sqlx::query_scalar(include_str!("../../queries/user_exists.sql"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if existing.is_some() {
            exn::bail!(ErrorKind::ExistentUser);
        }

        let salt = crypto::random_string(PASSWORD_SALT_LENGTH);
        let hash = crypto::hash_password_blocking(self.password, password, &salt).await?;
        let inserted = sqlx::query(include_str!("../../queries/insert_user.sql"))
            .bind(username)
            .bind(hash)
            .bind(salt)
            .bind(SessionLedger::default().encode()?)
            .execute(&self.pool)
            .await;
        match inserted {
            Ok(_) => {},
            // Lost a race with a concurrent registration of the same name.
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => exn::bail!(ErrorKind::ExistentUser),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
        }
        tracing::info!("registered user");
        Ok(())
    }

    /// Check the password and issue a new session token.
    ///
    /// The returned raw token is never persisted; only its salted hash is.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let stored: Option<(String, String)> = sqlx::query_as(include_str!("../../queries/get_user_password.sql"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some((expected, salt)) = stored else {
            // Spend the same effort as a real check before answering.
            let salt = crypto::random_string(PASSWORD_SALT_LENGTH);
            crypto::hash_password_blocking(self.password, password, &salt).await?;
            tracing::warn!("login for unknown user");
            exn::bail!(ErrorKind::InexistentUser);
        };
        let actual = crypto::hash_password_blocking(self.password, password, &salt).await?;
        if !crypto::hashes_match(&actual, &expected) {
            tracing::warn!("login with invalid password");
            exn::bail!(ErrorKind::InvalidPassword);
        }

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let (user_id, mut ledger) = Self::lock_ledger(&mut *tx, username).await?;
        let token = ledger.issue();
        Self::store_ledger(&mut *tx, user_id, &ledger).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(sessions = ledger.len(), "user logged in");
        Ok(token)
    }

    /// Revoke one session token.
    ///
    /// An unknown token leaves the ledger untouched.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, username: &str, token: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let (user_id, mut ledger) = Self::lock_ledger(&mut *tx, username).await?;
        if ledger.remove(token).is_none() {
            tracing::warn!("logout with unknown token");
            exn::bail!(ErrorKind::InvalidToken);
        }
        Self::store_ledger(&mut *tx, user_id, &ledger).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(sessions = ledger.len(), "user logged out");
        Ok(())
    }

    /// The single gate in front of every authenticated operation.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Authenticated> {
        let row: Option<(i64, String)> = sqlx::query_as(include_str!("../../queries/get_user_tokens.sql"))
            .bind(&credentials.username)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (user_id, raw) = row.ok_or_raise(|| ErrorKind::InexistentUser)?;
        if !SessionLedger::decode(&raw)?.contains(&credentials.token) {
            exn::bail!(ErrorKind::InvalidToken);
        }
        Ok(Authenticated { user_id })
    }

    /// Like [`authenticate`](Self::authenticate), but rejected credentials
    /// are `false` rather than an error. Storage failures still propagate.
    pub async fn is_auth_data_valid(&self, credentials: &Credentials) -> Result<bool> {
        match self.authenticate(credentials).await {
            Ok(_) => Ok(true),
            Err(err) if matches!(&*err, ErrorKind::InexistentUser | ErrorKind::InvalidToken) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The username exactly as it was registered.
    pub async fn username(&self, auth: &Authenticated) -> Result<String> {
        sqlx::query_scalar::<_, String>(include_str!("../../queries/get_username.sql"))
            .bind(auth.user_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::InexistentUser)
    }

    /// Take the write lock on the user's row, then read its ledger.
    ///
    /// Locking first means no concurrent login or logout can slip in between
    /// this read and the write that follows it.
    async fn lock_ledger(tx: &mut sqlx::SqliteConnection, username: &str) -> Result<(i64, SessionLedger)> {
        let locked = sqlx::query(include_str!("../../queries/lock_user_tokens.sql"))
            .bind(username)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if locked.rows_affected() == 0 {
            exn::bail!(ErrorKind::InexistentUser);
        }
        let (user_id, raw): (i64, String) = sqlx::query_as(include_str!("../../queries/get_user_tokens.sql"))
            .bind(username)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok((user_id, SessionLedger::decode(&raw)?))
    }

    async fn store_ledger(tx: &mut sqlx::SqliteConnection, user_id: i64, ledger: &SessionLedger) -> Result<()> {
        sqlx::query(include_str!("../../queries/set_user_tokens.sql"))
            .bind(ledger.encode()?)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TEST_PARAMS;
    use crate::models::MAX_TOKENS_PER_USER;
    use rstest::rstest;

    async fn repo() -> UserRepository {
        let db = Database::connect_in_memory().await.unwrap().with_password_params(TEST_PARAMS);
        UserRepository::from(&db)
    }

    async fn stored_ledger(repo: &UserRepository, username: &str) -> String {
        sqlx::query_scalar("SELECT session_tokens FROM Users WHERE username = ? COLLATE NOCASE")
            .bind(username)
            .fetch_one(&repo.pool)
            .await
            .unwrap()
    }

    #[rstest]
    #[case("Ammie", true)]
    #[case("a.b_c-9", true)]
    #[case("x", true)]
    #[case("", false)]
    #[case("with space", false)]
    #[case("semi;colon", false)]
    #[case("ünï", false)]
    fn test_username_rule(#[case] username: &str, #[case] allowed: bool) {
        assert_eq!(is_username_allowed(username), allowed);
    }

    #[rstest]
    #[case("", "pw", ErrorKind::DisallowedUsername)]
    #[case("bad name", "pw", ErrorKind::DisallowedUsername)]
    #[case("good", "", ErrorKind::DisallowedPassword)]
    #[tokio::test]
    async fn test_register_rejects(#[case] username: &str, #[case] password: &str, #[case] expected: ErrorKind) {
        let repo = repo().await;
        let err = repo.register(username, password).await.unwrap_err();
        assert_eq!(*err, expected);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Users").fetch_one(&repo.pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[rstest]
    #[case("Ammie")]
    #[case("ammie")]
    #[case("AMMIE")]
    #[tokio::test]
    async fn test_register_twice_any_case(#[case] second: &str) {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        let err = repo.register(second, "dogs456").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExistentUser));
        // The first registration is untouched.
        repo.login("ammie", "cats123").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_stores_empty_ledger() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        assert!(SessionLedger::decode(&stored_ledger(&repo, "Ammie").await).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_and_username_case() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        let token = repo.login("Ammie", "cats123").await.unwrap();
        assert!(token.len() >= 40);

        let auth = repo.authenticate(&Credentials::new("ammie", &token)).await.unwrap();
        assert_eq!(repo.username(&auth).await.unwrap(), "Ammie");
    }

    #[rstest]
    #[case("Ammie", "cats124", ErrorKind::InvalidPassword)]
    #[case("Ammie", "", ErrorKind::InvalidPassword)]
    #[case("Bobbie", "cats123", ErrorKind::InexistentUser)]
    #[tokio::test]
    async fn test_login_rejects(#[case] username: &str, #[case] password: &str, #[case] expected: ErrorKind) {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        let err = repo.login(username, password).await.unwrap_err();
        assert_eq!(*err, expected);
        assert!(SessionLedger::decode(&stored_ledger(&repo, "Ammie").await).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_evicts_oldest_session() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        let mut tokens = Vec::new();
        for _ in 0..MAX_TOKENS_PER_USER {
            tokens.push(repo.login("Ammie", "cats123").await.unwrap());
        }
        let newest = repo.login("Ammie", "cats123").await.unwrap();

        let ledger = SessionLedger::decode(&stored_ledger(&repo, "Ammie").await).unwrap();
        assert_eq!(ledger.len(), MAX_TOKENS_PER_USER);
        let err = repo.authenticate(&Credentials::new("Ammie", &tokens[0])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidToken));
        for token in tokens[1..].iter().chain([&newest]) {
            repo.authenticate(&Credentials::new("Ammie", token)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_logout() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        let first = repo.login("Ammie", "cats123").await.unwrap();
        let second = repo.login("Ammie", "cats123").await.unwrap();

        repo.logout("AMMIE", &first).await.unwrap();
        assert!(!repo.is_auth_data_valid(&Credentials::new("Ammie", &first)).await.unwrap());
        assert!(repo.is_auth_data_valid(&Credentials::new("Ammie", &second)).await.unwrap());

        let err = repo.logout("Ammie", &first).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidToken));
    }

    #[tokio::test]
    async fn test_logout_unknown_token_keeps_ledger() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        repo.login("Ammie", "cats123").await.unwrap();
        let before = stored_ledger(&repo, "Ammie").await;

        let err = repo.logout("Ammie", "never-issued").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidToken));
        assert_eq!(stored_ledger(&repo, "Ammie").await, before);

        let err = repo.logout("Nobody", "never-issued").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InexistentUser));
    }

    #[tokio::test]
    async fn test_token_is_bound_to_its_user() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        repo.register("Bobbie", "dogs456").await.unwrap();
        let token = repo.login("Ammie", "cats123").await.unwrap();

        let err = repo.authenticate(&Credentials::new("Bobbie", &token)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidToken));
        let err = repo.authenticate(&Credentials::new("Nobody", &token)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InexistentUser));
    }

    #[tokio::test]
    async fn test_is_auth_data_valid_never_rejects() {
        let repo = repo().await;
        assert!(!repo.is_auth_data_valid(&Credentials::new("Nobody", "token")).await.unwrap());
        repo.register("Ammie", "cats123").await.unwrap();
        assert!(!repo.is_auth_data_valid(&Credentials::new("Ammie", "")).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_empty_ledger_is_accepted() {
        let repo = repo().await;
        repo.register("Ammie", "cats123").await.unwrap();
        sqlx::query("UPDATE Users SET session_tokens = ''").execute(&repo.pool).await.unwrap();
        let token = repo.login("Ammie", "cats123").await.unwrap();
        repo.authenticate(&Credentials::new("Ammie", &token)).await.unwrap();
    }

    const CONCURRENT_SESSIONS: usize = 16;

    /// A file database, so that the pool really hands out several connections.
    async fn file_repo(dir: &tempfile::TempDir) -> UserRepository {
        let db = Database::connect(dir.path().join("hv.sqlite3")).await.unwrap().with_password_params(TEST_PARAMS);
        UserRepository::from(&db)
    }

    fn login_concurrently(repo: &UserRepository, count: usize) -> Vec<tokio::task::JoinHandle<String>> {
        (0..count)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.login("Ammie", "cats123").await.unwrap() })
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_keep_every_token() {
        let dir = tempfile::tempdir().unwrap();
        let repo = file_repo(&dir).await;
        repo.register("Ammie", "cats123").await.unwrap();

        let mut tokens = Vec::new();
        for task in login_concurrently(&repo, CONCURRENT_SESSIONS) {
            tokens.push(task.await.unwrap());
        }

        for token in &tokens {
            repo.authenticate(&Credentials::new("Ammie", token)).await.unwrap();
        }
        let ledger = SessionLedger::decode(&stored_ledger(&repo, "Ammie").await).unwrap();
        assert_eq!(ledger.len(), CONCURRENT_SESSIONS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_logouts_and_logins() {
        let dir = tempfile::tempdir().unwrap();
        let repo = file_repo(&dir).await;
        repo.register("Ammie", "cats123").await.unwrap();
        let mut old = Vec::new();
        for _ in 0..CONCURRENT_SESSIONS / 2 {
            old.push(repo.login("Ammie", "cats123").await.unwrap());
        }

        let logouts: Vec<_> = old
            .iter()
            .cloned()
            .map(|token| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.logout("Ammie", &token).await.unwrap() })
            })
            .collect();
        let logins = login_concurrently(&repo, CONCURRENT_SESSIONS / 2);
        for task in logouts {
            task.await.unwrap();
        }
        let mut new = Vec::new();
        for task in logins {
            new.push(task.await.unwrap());
        }

        for token in &old {
            assert!(!repo.is_auth_data_valid(&Credentials::new("Ammie", token)).await.unwrap());
        }
        for token in &new {
            assert!(repo.is_auth_data_valid(&Credentials::new("Ammie", token)).await.unwrap());
        }
        let ledger = SessionLedger::decode(&stored_ledger(&repo, "Ammie").await).unwrap();
        assert_eq!(ledger.len(), CONCURRENT_SESSIONS / 2);
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let debug = format!("{:?}", Credentials::new("Ammie", "secret-token"));
        assert!(debug.contains("Ammie"));
        assert!(!debug.contains("secret-token"));
    }
}
