//! Tag-filtered, paginated search.
//!
//! One [`SearchQuery`] produces both the COUNT and the page SELECT from the
//! same filter clauses, so totals and results can never disagree. Every piece
//! of caller input is bound as a parameter; only fixed clause templates are
//! ever pushed as SQL text.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{ErrorKind, Result};
use crate::models::Doujin;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 100;

const COUNT_SELECT: &str = "SELECT COUNT(*) FROM Doujins";
const FETCH_SELECT: &str = "\
    SELECT id, title, subtitle, upload_date, external_rating, tags, characters, artists, groups, languages, pages, \
    COALESCE((SELECT p.id FROM DoujinPages AS p WHERE p.doujin_id = Doujins.id AND p.page_number = 1 ORDER BY p.id LIMIT 1), 0) AS cover_page_id \
    FROM Doujins";
const TEXT_FILTER: [&str; 3] = [" WHERE (title LIKE ", r" ESCAPE '\' OR subtitle LIKE ", r" ESCAPE '\')"];
const TAG_FILTER: [&str; 2] = [" AND EXISTS (SELECT 1 FROM json_each(Doujins.tags) AS jt WHERE jt.value = ", ")"];
const ANTI_TAG_FILTER: [&str; 2] = [" AND NOT EXISTS (SELECT 1 FROM json_each(Doujins.tags) AS jt WHERE jt.value = ", ")"];
const ORDER_AND_LIMIT: [&str; 2] = [" ORDER BY datetime(upload_date) DESC, id DESC LIMIT ", " OFFSET "];

/// Search parameters as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    /// Substring matched against title or subtitle. Empty matches everything.
    #[serde(default)]
    pub query: String,
    /// Every one of these must be present.
    #[serde(default)]
    pub tags: Vec<String>,
    /// None of these may be present.
    #[serde(default)]
    pub anti_tags: Vec<String>,
    pub page_size: i64,
    pub page_number: i64,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub entries: Vec<Doujin>,
    pub total_pages: i64,
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    size: i64,
    number: i64,
}
impl Page {
    pub fn new(size: i64, number: i64) -> Result<Self> {
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            exn::bail!(ErrorKind::InvalidPageSize);
        }
        if number < 1 {
            exn::bail!(ErrorKind::InvalidPageNumber);
        }
        Ok(Self { size, number })
    }

    pub fn total_pages(&self, count: i64) -> i64 {
        (count + self.size - 1) / self.size
    }

    /// Check that this page exists for `count` matching rows.
    pub fn check_within(&self, count: i64) -> Result<()> {
        if self.number > self.total_pages(count) {
            exn::bail!(ErrorKind::InvalidPageNumber);
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        self.size * (self.number - 1)
    }
}

impl SearchQuery {
    pub fn page(&self) -> Result<Page> {
        Page::new(self.page_size, self.page_number)
    }

    /// `COUNT(*)` over every doujin matching the filters.
    pub fn count_query(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(COUNT_SELECT);
        self.push_filters(&mut qb);
        qb
    }

    /// The requested page of matching doujins, most recent upload first.
    pub fn fetch_query(&self, page: Page) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(FETCH_SELECT);
        self.push_filters(&mut qb);
        qb.push(ORDER_AND_LIMIT[0]);
        qb.push_bind(page.size);
        qb.push(ORDER_AND_LIMIT[1]);
        qb.push_bind(page.offset());
        qb
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        let pattern = format!("%{}%", escape_like(&self.query));
        qb.push(TEXT_FILTER[0]);
        qb.push_bind(pattern.clone());
        qb.push(TEXT_FILTER[1]);
        qb.push_bind(pattern);
        qb.push(TEXT_FILTER[2]);
        for tag in &self.tags {
            qb.push(TAG_FILTER[0]);
            qb.push_bind(tag.clone());
            qb.push(TAG_FILTER[1]);
        }
        for tag in &self.anti_tags {
            qb.push(ANTI_TAG_FILTER[0]);
            qb.push_bind(tag.clone());
            qb.push(ANTI_TAG_FILTER[1]);
        }
    }
}

/// Escape `LIKE` wildcards (with `\` as the escape character).
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
