use exn::ResultExt;
use hv_store::{DoujinRepository, NewDoujin};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::import::metadata::Metadata;
use crate::import::pages::{check_sequence, page_number};

/// Import one doujin folder, returning the new doujin's id.
///
/// The folder is validated against its metadata before anything is written,
/// and the doujin and its pages are then registered in one transaction:
/// either all of them become visible or none do. Page paths are stored
/// absolute so the server can find them regardless of its working directory.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub async fn import_folder(repo: &DoujinRepository, folder: &Path) -> Result<i64> {
    let folder = tokio::fs::canonicalize(folder).await.or_raise(|| ErrorKind::Io(folder.to_path_buf()))?;
    let metadata = Metadata::read(&folder).await?;
    let declared = metadata.pages;
    let mut pages = list_pages(&folder).await?;
    let mut numbers: Vec<u32> = pages.iter().map(|(number, _)| *number).collect();
    check_sequence(&mut numbers, declared)?;
    pages.sort_unstable_by_key(|(number, _)| *number);

    tracing::info!(title = %metadata.title, pages = declared, "importing doujin");
    let mut import = repo.begin_import(&NewDoujin::from(metadata)).await.or_raise(|| ErrorKind::Store)?;
    for (number, path) in &pages {
        import.add_page(*number, path).await.or_raise(|| ErrorKind::Store)?;
    }
    import.commit().await.or_raise(|| ErrorKind::Store)
}

/// Files in `folder` whose names are page numbers. Sub-folders are skipped.
async fn list_pages(folder: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(folder).await.or_raise(|| ErrorKind::Io(folder.to_path_buf()))?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Io(folder.to_path_buf()))? {
        let path = entry.path();
        let file_type = entry.file_type().await.or_raise(|| ErrorKind::Io(path.clone()))?;
        if file_type.is_dir() {
            continue;
        }
        let Some(number) = entry.file_name().to_str().and_then(page_number) else {
            tracing::trace!(path = %path.display(), "not a page, skipping");
            continue;
        };
        pages.push((number, path));
    }
    Ok(pages)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hv_store::{Authenticated, Credentials, Database, PasswordParams, SearchQuery, UserRepository};

    pub(crate) struct Fixture {
        pub(crate) repo: DoujinRepository,
        pub(crate) auth: Authenticated,
        pub(crate) db: Database,
    }

    pub(crate) async fn fixture() -> Fixture {
        let params = PasswordParams { iterations: 1, memory_kib: 8, parallelism: 1 };
        let db = Database::connect_in_memory().await.unwrap().with_password_params(params);
        let users = UserRepository::from(&db);
        users.register("Ammie", "cats123").await.unwrap();
        let token = users.login("Ammie", "cats123").await.unwrap();
        let auth = users.authenticate(&Credentials::new("Ammie", token)).await.unwrap();
        Fixture { repo: DoujinRepository::from(&db), auth, db }
    }

    /// Write a doujin folder declaring `declared` pages and holding `files`.
    pub(crate) fn doujin_folder(parent: &Path, name: &str, declared: u32, files: &[&str]) -> PathBuf {
        let folder = parent.join(name);
        std::fs::create_dir_all(&folder).unwrap();
        let metadata = format!(
            r#"{{"title": "{name}", "upload_date": "2021-03-04T05:06:07Z", "tag": ["yuri"], "pages": {declared}}}"#
        );
        std::fs::write(folder.join("metadata.json"), metadata).unwrap();
        for file in files {
            std::fs::write(folder.join(file), b"image").unwrap();
        }
        folder
    }

    pub(crate) async fn doujin_count(fixture: &Fixture) -> usize {
        let query = SearchQuery { query: String::new(), tags: vec![], anti_tags: vec![], page_size: 100, page_number: 1 };
        fixture.repo.search(&fixture.auth, &query).await.unwrap().entries.len()
    }

    pub(crate) async fn page_row_count(fixture: &Fixture) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM DoujinPages").fetch_one(fixture.db.pool()).await.unwrap()
    }

    #[tokio::test]
    async fn test_import_folder() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let folder = doujin_folder(dir.path(), "Yume", 3, &["3.png", "1.png", "02.jpg", "cover.png"]);
        std::fs::create_dir(folder.join("4")).unwrap();

        let id = import_folder(&fixture.repo, &folder).await.unwrap();
        let doujin = fixture.repo.get_doujin(&fixture.auth, id).await.unwrap();
        assert_eq!(doujin.title, "Yume");
        assert_eq!(doujin.tags, ["yuri"]);
        assert_eq!(doujin.page_count, 3);
        assert_eq!(doujin.pages.iter().map(|p| p.number).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(page_row_count(&fixture).await, 3);

        let folder = folder.canonicalize().unwrap();
        let second = fixture.repo.page_path(&fixture.auth, doujin.pages[1].id).await.unwrap();
        assert_eq!(second, folder.join("02.jpg"));
    }

    #[tokio::test]
    async fn test_missing_pages_leave_no_rows() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let folder = doujin_folder(dir.path(), "Short", 3, &["1.png", "2.png"]);

        let err = import_folder(&fixture.repo, &folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingPages { found: 2, expected: 3 }));
        assert_eq!(doujin_count(&fixture).await, 0);
        assert_eq!(page_row_count(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_non_sequential_pages() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let folder = doujin_folder(dir.path(), "Gap", 3, &["1.png", "2.png", "4.png"]);

        let err = import_folder(&fixture.repo, &folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NonSequentialPages { expected: 3, found: 4 }));
        assert_eq!(doujin_count(&fixture).await, 0);
        assert_eq!(page_row_count(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_too_many_pages() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let folder = doujin_folder(dir.path(), "Long", 1, &["1.png", "2.png"]);

        let err = import_folder(&fixture.repo, &folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooManyPages { found: 2, expected: 1 }));
    }

    #[tokio::test]
    async fn test_bad_metadata() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let folder = doujin_folder(dir.path(), "Broken", 1, &["1.png"]);
        std::fs::write(folder.join("metadata.json"), "{").unwrap();

        let err = import_folder(&fixture.repo, &folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata(_)));
        assert_eq!(doujin_count(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_missing_folder() {
        let fixture = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let err = import_folder(&fixture.repo, &dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }
}
