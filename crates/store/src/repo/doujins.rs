//! Read access to the catalogue and the write side of an import.

use exn::{OptionExt, ResultExt};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Doujin, DoujinRow, NewDoujin, NewDoujinRow, PageRef, PageRow};
use crate::repo::Authenticated;
use crate::search::{SearchQuery, SearchResult};

fn sqlx_hates_paths(path: &Path) -> Result<String> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

/// Repository for `Doujins` and their `DoujinPages`.
#[derive(Debug, Clone)]
pub struct DoujinRepository {
    pool: SqlitePool,
}
impl From<&Database> for DoujinRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl DoujinRepository {
    // =========================================================================
    // Search
    // =========================================================================

    /// One page of doujins matching the query, most recent upload first.
    ///
    /// No match at all is an empty result, while asking for a page past the
    /// last one is [`ErrorKind::InvalidPageNumber`].
    #[instrument(skip(self, _auth), fields(tags = query.tags.len(), anti_tags = query.anti_tags.len()))]
    pub async fn search(&self, _auth: &Authenticated, query: &SearchQuery) -> Result<SearchResult> {
        let page = query.page()?;
        // Count and fetch see the same snapshot.
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let count: i64 = query
            .count_query()
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if count == 0 {
            return Ok(SearchResult::default());
        }
        page.check_within(count)?;
        let rows: Vec<DoujinRow> = query
            .fetch_query(page)
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(SearchResult {
            entries: rows.into_iter().map(Doujin::try_from).collect::<Result<Vec<_>>>()?,
            total_pages: page.total_pages(count),
        })
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// A doujin with every page, ordered by page number.
    pub async fn get_doujin(&self, _auth: &Authenticated, id: i64) -> Result<Doujin> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let row: DoujinRow = sqlx::query_as(include_str!("../../queries/get_doujin.sql"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::InvalidId)?;
        let pages: Vec<PageRow> = sqlx::query_as(include_str!("../../queries/list_doujin_pages.sql"))
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(Doujin {
            pages: pages.into_iter().map(PageRef::try_from).collect::<Result<Vec<_>>>()?,
            ..Doujin::try_from(row)?
        })
    }

    /// Location on disk of one page image.
    pub async fn page_path(&self, _auth: &Authenticated, page_id: i64) -> Result<PathBuf> {
        let path: String = sqlx::query_scalar(include_str!("../../queries/get_page_path.sql"))
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::InvalidId)?;
        Ok(PathBuf::from(path))
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Every distinct tag across the catalogue, sorted.
    pub async fn all_tags(&self, _auth: &Authenticated) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(include_str!("../../queries/list_all_tags.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(tags)
    }

    // =========================================================================
    // Import
    // =========================================================================

    /// Start registering a doujin.
    ///
    /// The doujin row and every page added to the returned [`DoujinImport`]
    /// become visible together on [`DoujinImport::commit`]. Dropping it
    /// instead leaves no trace.
    #[instrument(skip_all, fields(title = %doujin.title))]
    pub async fn begin_import(&self, doujin: &NewDoujin) -> Result<DoujinImport> {
        let row = NewDoujinRow::try_from(doujin)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result = sqlx::query(include_str!("../../queries/insert_doujin.sql"))
            .bind(row.title)
            .bind(row.subtitle)
            .bind(row.upload_date)
            .bind(row.external_rating)
            .bind(row.tags)
            .bind(row.characters)
            .bind(row.artists)
            .bind(row.groups)
            .bind(row.languages)
            .bind(row.pages)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(DoujinImport { tx, doujin_id: result.last_insert_rowid(), pages: 0 })
    }
}

/// An import in progress, holding its own transaction.
pub struct DoujinImport {
    tx: Transaction<'static, Sqlite>,
    doujin_id: i64,
    pages: usize,
}
impl DoujinImport {
    pub fn doujin_id(&self) -> i64 {
        self.doujin_id
    }

    /// Number of pages added so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub async fn add_page(&mut self, number: u32, path: &Path) -> Result<i64> {
        let result = sqlx::query(include_str!("../../queries/insert_page.sql"))
            .bind(self.doujin_id)
            .bind(sqlx_hates_paths(path)?)
            .bind(i64::from(number))
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.pages += 1;
        Ok(result.last_insert_rowid())
    }

    /// Make the doujin and its pages visible, returning the doujin id.
    pub async fn commit(self) -> Result<i64> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(id = self.doujin_id, pages = self.pages, "doujin registered");
        Ok(self.doujin_id)
    }
}
