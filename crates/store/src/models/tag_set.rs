use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::list;

/// A saved search preset owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSet {
    pub id: i64,
    pub tags: Vec<String>,
    pub anti_tags: Vec<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TagSetRow {
    pub(crate) id: i64,
    pub(crate) tags: String,
    pub(crate) anti_tags: String,
}
impl TryFrom<TagSetRow> for TagSet {
    type Error = Error;
    fn try_from(row: TagSetRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            tags: list::decode(&row.tags, "tag set tags")?,
            anti_tags: list::decode(&row.anti_tags, "tag set anti-tags")?,
        })
    }
}
