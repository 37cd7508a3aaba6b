mod doujin;
mod ledger;
pub(crate) mod list;
mod tag_set;

pub use self::doujin::{Doujin, NewDoujin, PageRef};
pub(crate) use self::doujin::{DoujinRow, NewDoujinRow, PageRow};
pub use self::ledger::{MAX_TOKENS_PER_USER, SessionLedger, TokenEntry};
pub use self::tag_set::TagSet;
pub(crate) use self::tag_set::TagSetRow;
