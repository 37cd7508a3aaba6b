use exn::ResultExt;
use hv_store::NewDoujin;
use serde::Deserialize;
use std::path::Path;
use time::OffsetDateTime;

use crate::error::{ErrorKind, Result};

/// Name of the metadata file inside every doujin folder.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Help text describing the `metadata.json` format.
pub const META_FORMAT: &str = r#"The metadata.json File Format

Every doujin folder must contain a metadata.json file shaped like this:

```
{
    "title": "[AmmieNyami] Yume no Kyouka ~ Fantastical Ecstasy",
    "subtitle": "[AmmieNyami] 夢の狂華　〜 Fantastical Ecstasy",
    "favorite_counts": 69420,
    "upload_date": "1996-08-15T07:00:50-03:00",
    "character": ["Amane Mitsuda", "Touma Hisui"],
    "tag": ["yuri", "romance", "slice of life"],
    "artist": ["AmmieNyami"],
    "group": ["Team Scarlet Reverie"],
    "language": ["english"],
    "pages": 20
}
```

Fields:

- "title" (required): the doujin's title.
- "subtitle": the doujin's subtitle, usually the title in its original script.
- "favorite_counts": rating from the site the doujin was downloaded from,
  such as a number of views or favorites. Defaults to 0.
- "upload_date" (required): when the doujin was uploaded to that site, or
  first published or imported, as an RFC 3339 timestamp.
- "character": the doujin's main characters.
- "tag": the doujin's tags.
- "artist": the artists who worked on the doujin.
- "group": the groups who worked on the doujin.
- "language": the languages used in the doujin.
- "pages" (required, "Pages" is also accepted): the number of pages.

Missing lists are treated as empty. Alongside metadata.json the folder must
hold exactly one image per page, named by its page number starting from 1
(for example 1.png, 2.png, ... 20.png). Other files and sub-folders are
ignored.
"#;

/// Contents of a doujin folder's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default, rename = "favorite_counts")]
    pub external_rating: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
    #[serde(default, rename = "character", deserialize_with = "nullable_list")]
    pub characters: Vec<String>,
    #[serde(default, rename = "tag", deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
    #[serde(default, rename = "artist", deserialize_with = "nullable_list")]
    pub artists: Vec<String>,
    #[serde(default, rename = "group", deserialize_with = "nullable_list")]
    pub groups: Vec<String>,
    #[serde(default, rename = "language", deserialize_with = "nullable_list")]
    pub languages: Vec<String>,
    #[serde(alias = "Pages")]
    pub pages: u32,
}

fn nullable_list<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Metadata {
    /// Read `metadata.json` from a doujin folder.
    pub async fn read(folder: &Path) -> Result<Self> {
        let path = folder.join(METADATA_FILE_NAME);
        let bytes = tokio::fs::read(&path).await.or_raise(|| ErrorKind::Io(path.clone()))?;
        Self::parse(&bytes, &path)
    }

    /// `path` is only used to describe errors.
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::Metadata(path.to_path_buf()))
    }
}

impl From<Metadata> for NewDoujin {
    fn from(metadata: Metadata) -> Self {
        Self {
            title: metadata.title,
            subtitle: metadata.subtitle,
            upload_date: metadata.upload_date,
            external_rating: metadata.external_rating,
            tags: metadata.tags,
            characters: metadata.characters,
            artists: metadata.artists,
            groups: metadata.groups,
            languages: metadata.languages,
            page_count: metadata.pages,
        }
    }
}
