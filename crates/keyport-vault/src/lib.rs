//! `keyport-vault`: canonical credential model and foreign vault readers.
//!
//! [`convert`] reads an OPVault directory, a 1PUX archive, a Bitwarden JSON
//! export (plaintext or password protected) or a Proton Pass JSON export
//! into a fresh [`Database`] plus a list of per-item warnings.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod database;
pub mod entry;
pub mod error;
pub mod options;

pub mod import;

pub use database::{Database, Group, GroupId, Metadata};
pub use entry::{Attribute, Entry, EntryAttributes, EntryTimes};
pub use error::ImportError;
pub use import::{convert, ImportFormat, ImportReport, ImportWarning, Importer, WarningKind};
pub use options::ImportOptions;
