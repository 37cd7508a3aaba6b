//! Import pipeline for the hv doujin library.
//!
//! A doujin folder holds a `metadata.json` file (see [`META_FORMAT`]) and one
//! image per page, named by page number (`1.png`, `02.jpg`, ...). Importing
//! validates the folder against its metadata and registers the doujin and its
//! pages in a single store transaction.

pub mod error;
mod import;

pub use crate::import::{ImportEvent, METADATA_FILE_NAME, META_FORMAT, Metadata, import_all, import_folder};
