use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use hv_store::DoujinRepository;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::import::folder::import_folder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    Started,
    Imported { folder: PathBuf, id: i64 },
    /// Number of doujins imported.
    Complete(usize),
}

/// Import every immediate sub-folder of `root` as a doujin, in name order.
///
/// The stream ends after the first error; doujins imported before it stay
/// imported.
pub fn import_all<'a>(repo: &'a DoujinRepository, root: &'a Path) -> impl Stream<Item = Result<ImportEvent>> + 'a {
    stream! {
        yield Ok(ImportEvent::Started);
        let folders = match subfolders(root).await {
            Ok(folders) => folders,
            Err(err) => {
                yield Err(err);
                return;
            },
        };
        let mut count = 0;
        for folder in folders {
            match import_folder(repo, &folder).await.or_raise(|| ErrorKind::Folder(folder.clone())) {
                Ok(id) => {
                    count += 1;
                    yield Ok(ImportEvent::Imported { folder, id });
                },
                Err(err) => {
                    yield Err(err);
                    return;
                },
            }
        }
        yield Ok(ImportEvent::Complete(count));
    }
}

async fn subfolders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(root).await.or_raise(|| ErrorKind::Io(root.to_path_buf()))?;
    let mut folders = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Io(root.to_path_buf()))? {
        let file_type = entry.file_type().await.or_raise(|| ErrorKind::Io(entry.path()))?;
        if file_type.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort_unstable();
    Ok(folders)
}
