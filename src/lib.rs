pub mod book;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod fingerprint;
pub mod models;
pub mod normalize;
pub mod reconcile;

pub use book::{AddressBook, SyncAction};
pub use config::BookConfig;
pub use db::Database;
pub use error::{ContactError, Result};
pub use fingerprint::{compute_fingerprint, Fingerprint, FingerprintIndex, HashKey};
pub use models::ContactRecord;
pub use reconcile::{reconcile, Decision, FieldChange, MergePolicy};
