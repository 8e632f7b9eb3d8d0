//! Append-only disk store for metric records.
//!
//! A store is a pair of files sharing a base path: `<base>.idx` holds one fixed size slot per
//! record and `<base>.dat` holds the checksummed entries. See [`format`] for the layout.

pub mod format;
mod record;
mod store;

pub use self::record::Record;
pub use self::store::{RecordId, RecoverySummary, Store, StoreOptions};
pub use crate::errors::MdbError;
