//! Persistence adapter contract and the SQLite reference adapter.
//!
//! # Responsibility
//! - Define the capability the lifecycle engine calls for every marker read
//!   and write.
//! - Report storage failures as semantic errors (`NotFound`) in addition to
//!   DB transport errors.
//!
//! # Invariants
//! - `set_marker_hooked` runs the store's own save hooks; `set_marker_direct`
//!   and `bulk_set_marker` never do.
//! - A `false` return from a single-record write means a store-level guard
//!   vetoed it and nothing was persisted.

use crate::db::DbError;
use crate::model::state::Marker;
use crate::scope::QueryScope;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod sqlite;

/// Stable record identifier used by the reference adapter.
pub type RecordId = Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence adapter errors.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    Db(DbError),
    /// Target record does not exist.
    NotFound(RecordId),
    /// Persisted data cannot be converted into a record.
    InvalidData(String),
    /// Table name cannot be used as a SQL identifier.
    InvalidTableName(String),
    /// Required table is missing.
    MissingRequiredTable(String),
    /// Required column is missing from the table.
    MissingRequiredColumn { table: String, column: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::InvalidTableName(table) => {
                write!(f, "table name is not a plain identifier: `{table}`")
            }
            Self::MissingRequiredTable(table) => {
                write!(f, "marker store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "marker store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence capability consumed by the lifecycle engine.
pub trait MarkerStore {
    /// In-memory record representation handed to hooks.
    type Record;
    /// Collection handle the scope policy composes filters on.
    type Scope: QueryScope;

    /// Collection with no filters at all.
    fn unscoped(&self) -> Self::Scope;

    fn get_marker(&self, record: &Self::Record) -> Marker;

    /// Writes the marker through the store's save-hook pipeline.
    ///
    /// Returns `Ok(false)` when a store-level guard vetoed the write.
    fn set_marker_hooked(&self, record: &mut Self::Record, value: Marker) -> StoreResult<bool>;

    /// Writes only the marker field, bypassing store save hooks.
    fn set_marker_direct(&self, record: &mut Self::Record, value: Marker) -> StoreResult<bool>;

    /// Set-based write over every record in `scope`; returns affected rows.
    fn bulk_set_marker(&self, scope: &Self::Scope, value: Marker) -> StoreResult<usize>;
}
