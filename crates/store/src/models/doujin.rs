use exn::ResultExt;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, ErrorKind, Result};
use crate::models::list;

/// A page reference as `(page_number, page_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "(u32, i64)")]
pub struct PageRef {
    pub number: u32,
    pub id: i64,
}
impl From<PageRef> for (u32, i64) {
    fn from(page: PageRef) -> Self {
        (page.number, page.id)
    }
}

/// A catalogued doujin.
///
/// From a search, `pages` only holds the cover (page 1, with id `0` when the
/// doujin has no first page). From [`get_doujin`](crate::DoujinRepository::get_doujin)
/// it holds every page ordered by page number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Doujin {
    pub id: i64,
    pub title: String,
    pub subtitle: String,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    pub external_rating: i64,
    pub tags: Vec<String>,
    pub characters: Vec<String>,
    pub artists: Vec<String>,
    pub groups: Vec<String>,
    pub languages: Vec<String>,
    pub page_count: u32,
    pub pages: Vec<PageRef>,
}

/// Everything needed to register a doujin, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDoujin {
    pub title: String,
    pub subtitle: String,
    pub upload_date: OffsetDateTime,
    pub external_rating: i64,
    pub tags: Vec<String>,
    pub characters: Vec<String>,
    pub artists: Vec<String>,
    pub groups: Vec<String>,
    pub languages: Vec<String>,
    pub page_count: u32,
}

#[derive(sqlx::FromRow)]
pub(crate) struct DoujinRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) subtitle: String,
    pub(crate) upload_date: String,
    pub(crate) external_rating: i64,
    pub(crate) tags: String,
    pub(crate) characters: String,
    pub(crate) artists: String,
    pub(crate) groups: String,
    pub(crate) languages: String,
    pub(crate) pages: i64,
    #[sqlx(default)]
    pub(crate) cover_page_id: i64,
}
impl TryFrom<DoujinRow> for Doujin {
    type Error = Error;
    fn try_from(row: DoujinRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            subtitle: row.subtitle,
            upload_date: OffsetDateTime::parse(&row.upload_date, &Rfc3339)
                .or_raise(|| ErrorKind::InvalidData("upload date"))?,
            external_rating: row.external_rating,
            tags: list::decode(&row.tags, "tags")?,
            characters: list::decode(&row.characters, "characters")?,
            artists: list::decode(&row.artists, "artists")?,
            groups: list::decode(&row.groups, "groups")?,
            languages: list::decode(&row.languages, "languages")?,
            page_count: u32::try_from(row.pages).or_raise(|| ErrorKind::InvalidData("page count"))?,
            pages: vec![PageRef { number: 1, id: row.cover_page_id }],
        })
    }
}

/// Column values for a `Doujins` insert.
pub(crate) struct NewDoujinRow {
    pub(crate) title: String,
    pub(crate) subtitle: String,
    pub(crate) upload_date: String,
    pub(crate) external_rating: i64,
    pub(crate) tags: String,
    pub(crate) characters: String,
    pub(crate) artists: String,
    pub(crate) groups: String,
    pub(crate) languages: String,
    pub(crate) pages: i64,
}
impl TryFrom<&NewDoujin> for NewDoujinRow {
    type Error = Error;
    fn try_from(doujin: &NewDoujin) -> Result<Self> {
        Ok(Self {
            title: doujin.title.clone(),
            subtitle: doujin.subtitle.clone(),
            upload_date: format_upload_date(doujin.upload_date)?,
            external_rating: doujin.external_rating,
            tags: list::encode(&doujin.tags, "tags")?,
            characters: list::encode(&doujin.characters, "characters")?,
            artists: list::encode(&doujin.artists, "artists")?,
            groups: list::encode(&doujin.groups, "groups")?,
            languages: list::encode(&doujin.languages, "languages")?,
            pages: i64::from(doujin.page_count),
        })
    }
}

/// RFC 3339 with whole seconds, keeping the source offset.
fn format_upload_date(date: OffsetDateTime) -> Result<String> {
    date.replace_nanosecond(0)
        .or_raise(|| ErrorKind::InvalidData("upload date"))?
        .format(&Rfc3339)
        .or_raise(|| ErrorKind::InvalidData("upload date"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    pub(crate) id: i64,
    pub(crate) page_number: i64,
}
impl TryFrom<PageRow> for PageRef {
    type Error = Error;
    fn try_from(row: PageRow) -> Result<Self> {
        Ok(Self {
            number: u32::try_from(row.page_number).or_raise(|| ErrorKind::InvalidData("page number"))?,
            id: row.id,
        })
    }
}
