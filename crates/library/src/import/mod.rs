mod folder;
mod metadata;
mod pages;
mod stream;

pub use self::folder::import_folder;
pub use self::metadata::{META_FORMAT, METADATA_FILE_NAME, Metadata};
pub use self::stream::{ImportEvent, import_all};
