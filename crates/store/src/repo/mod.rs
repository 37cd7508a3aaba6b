mod doujins;
mod tag_sets;
mod users;

pub use self::doujins::{DoujinImport, DoujinRepository};
pub use self::tag_sets::TagSetRepository;
pub use self::users::{Authenticated, Credentials, UserRepository, is_password_allowed, is_username_allowed};
