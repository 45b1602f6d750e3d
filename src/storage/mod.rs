pub mod db;
pub mod short_id;
mod shorts;
mod tables;

pub use db::{DatabaseError, ShortIdStore};
pub use short_id::{is_valid_short_id, RandomShortIds, ShortIdGenerator, SHORT_ID_ALPHABET, SHORT_ID_LEN};
pub use shorts::MAX_GENERATE_ATTEMPTS;
pub use tables::*;
