//! Opening the metadata store and keeping it on the expected schema.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::crypto::PasswordParams;
use crate::error::{ErrorKind, Result};

/// Schema migrations compiled into the binary.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// Every request handler holds a connection for one short transaction.
const MAX_CONNECTIONS: u32 = 8;
/// How long a login waits for another session of the same user to commit.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Value of `META.app_name` for a database owned by this application.
pub const APP_NAME: &str = "hv";
/// Value of `META.schema_version` this build reads and writes.
pub const SCHEMA_VERSION: &str = "v1";

/// Handle on the hv library database.
///
/// Holds the connection pool shared by every repository, together with the
/// Argon2 cost that [`UserRepository`](crate::UserRepository) hashes with.
/// Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    password: PasswordParams,
}

impl Database {
    /// Open the pool, refuse foreign files, then bring the schema up to date.
    ///
    /// A file that already has a `META` table is checked before any migration
    /// touches it; a fresh file gets `META` from the migration and is checked
    /// afterwards.
    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::per_connection_pragmas(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool, password: PasswordParams::default() };
        if db.has_metadata_table().await? {
            db.verify_metadata().await?;
        }
        db.migrate().await?;
        db.verify_metadata().await?;
        Ok(db)
    }

    /// Open (creating if needed) the library database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// A throwaway database living in memory, for tests in this and other crates.
    ///
    /// The pool holds a single connection since every `:memory:` connection
    /// is its own database. Never touch the pool while a transaction from it
    /// is still open.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    /// Replace the password hashing parameters used for registration and login.
    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.password = params;
        self
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Pages and tag sets go away with their doujin or user.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    /// PRAGMAs with no `SqliteConnectOptions` setter, run on every new connection.
    async fn per_connection_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("migrating library database", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    async fn has_metadata_table(&self) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/has_meta_table.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Refuse databases written by another application or another schema.
    #[instrument("verifying database metadata", skip(self))]
    async fn verify_metadata(&self) -> Result<()> {
        let row: Option<(String, String)> = sqlx::query_as(include_str!("../queries/get_meta.sql"))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some((app_name, schema_version)) = row else {
            exn::bail!(ErrorKind::InvalidMetadata);
        };
        check_metadata(&app_name, &schema_version)
    }

    /// The shared pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn password_params(&self) -> PasswordParams {
        self.password
    }

    /// Refresh planner statistics and close every connection once returned.
    ///
    /// Repositories created from this database stop working afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

fn check_metadata(app_name: &str, schema_version: &str) -> Result<()> {
    if app_name != APP_NAME {
        exn::bail!(ErrorKind::InvalidMetadata);
    }
    if schema_version != SCHEMA_VERSION {
        exn::bail!(ErrorKind::InvalidSchema);
    }
    Ok(())
}
