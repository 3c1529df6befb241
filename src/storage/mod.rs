//!  Storage is organized through [record_storage::JsonFileStorage].
//!  The basic idea is:
//!   - There is a single file holding every day, keyed by `YYYY-MM-DD`.
//!   - The file is read in full before any change and replaced in full after it.
//!   - Days missing fields, or files from older versions, are completed from
//!     [entities::DayRecord::default] when loaded.

pub mod document;
pub mod entities;
pub mod record_storage;
