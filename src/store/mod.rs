//! Record stores
//!
//! Inventory items and user profiles live in a local SQLite database; the KKN
//! logbook lives in a Supabase table. All of them report failures through
//! [`StoreError`].

pub mod database;
pub mod inventory;
pub mod logbook;
pub mod profiles;
pub mod supabase;

pub use database::Database;
pub use inventory::{InventoryItem, InventoryStore, InventorySummary, ItemSearchScope, NewItem};
pub use logbook::{EntryDate, LogEntry, LogStats, LogStatus, LogbookStore, NewLogEntry};
pub use profiles::{NewProfile, ProfileSearchScope, ProfileStore, UserProfile};
pub use supabase::{SupabaseClient, SupabaseError};

use crate::validation::ValidationError;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} '{key}' already exists")]
    DuplicateKey { entity: &'static str, key: String },

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Malformed tabular data: {0}")]
    Tabular(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl StoreError {
    pub fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            entity,
            key: key.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        Self::Tabular(err.to_string())
    }
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// True when SQLite rejected a write because of a UNIQUE constraint
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Case-insensitive substring match
pub(crate) fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Finish a CSV writer into a UTF-8 string
pub(crate) fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, StoreError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Tabular(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Tabular(e.to_string()))
}
