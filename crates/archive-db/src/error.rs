use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Any failure opening, reading or writing the per-room store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}
