use exn::{OptionExt, ResultExt};
use sqlx::{SqliteConnection, SqlitePool};

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{TagSet, TagSetRow, list};
use crate::repo::Authenticated;

/// Repository for saved search presets.
///
/// A tag set can only be changed or deleted by the user who created it.
#[derive(Debug, Clone)]
pub struct TagSetRepository {
    pool: SqlitePool,
}
impl From<&Database> for TagSetRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl TagSetRepository {
    pub async fn create(&self, auth: &Authenticated, tags: &[String], anti_tags: &[String]) -> Result<i64> {
        let result = sqlx::query(include_str!("../../queries/insert_tag_set.sql"))
            .bind(auth.user_id())
            .bind(list::encode(tags, "tag set tags")?)
            .bind(list::encode(anti_tags, "tag set anti-tags")?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn change(&self, auth: &Authenticated, id: i64, tags: &[String], anti_tags: &[String]) -> Result<()> {
        let tags = list::encode(tags, "tag set tags")?;
        let anti_tags = list::encode(anti_tags, "tag set anti-tags")?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::check_owner(&mut *tx, auth, id).await?;
        sqlx::query(include_str!("../../queries/update_tag_set.sql"))
            .bind(tags)
            .bind(anti_tags)
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn delete(&self, auth: &Authenticated, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::check_owner(&mut *tx, auth, id).await?;
        sqlx::query(include_str!("../../queries/delete_tag_set.sql"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// The caller's own tag sets, oldest first.
    pub async fn list(&self, auth: &Authenticated) -> Result<Vec<TagSet>> {
        let rows: Vec<TagSetRow> = sqlx::query_as(include_str!("../../queries/list_tag_sets.sql"))
            .bind(auth.user_id())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TagSet::try_from).collect()
    }

    async fn check_owner(conn: &mut SqliteConnection, auth: &Authenticated, id: i64) -> Result<()> {
        let owner: i64 = sqlx::query_scalar(include_str!("../../queries/get_tag_set_owner.sql"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::InvalidId)?;
        if owner != auth.user_id() {
            tracing::warn!(id, "tag set belongs to another user");
            exn::bail!(ErrorKind::Unauthorized);
        }
        Ok(())
    }
}
