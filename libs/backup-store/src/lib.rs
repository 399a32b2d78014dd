mod config;
mod filename;
mod store;

pub use config::{FilenameStyle, MESSAGE_PREFIX_LEN, TIMESTAMP_FORMAT};
pub use filename::{backup_stem, format_timestamp, message_fragment, timestamp_now};
pub use store::{BackupStore, write_to};
