//! SQLite implementation of the marker store.
//!
//! # Responsibility
//! - Map marker reads/writes and scope predicates onto one embedder-owned
//!   table.
//! - Run store-level save hooks around hooked writes.
//!
//! # Invariants
//! - The table has a TEXT `id` column holding UUIDs and an INTEGER (nullable)
//!   marker column holding epoch milliseconds.
//! - Table and column names are validated identifiers before any SQL is built.
//! - Hooked writes touch `updated_at` when the table has one; direct and bulk
//!   writes touch the marker column only.
//! - One statement binds at most `MAX_IDS_PER_STATEMENT` ids; larger id
//!   lists are split into batches, and batched bulk writes share one
//!   transaction.

use super::{MarkerStore, RecordId, StoreError, StoreResult};
use crate::hooks::SaveHooks;
use crate::model::record_type::{is_valid_identifier, RecordTypeConfig};
use crate::model::state::{is_removed, Marker};
use crate::scope::QueryScope;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

const ID_COLUMN: &str = "id";
const UPDATED_AT_COLUMN: &str = "updated_at";
/// Below SQLite's historical 999 bound-parameter limit, with room for the
/// marker value.
const MAX_IDS_PER_STATEMENT: usize = 500;

/// Marker-bearing projection of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteRecord {
    pub id: RecordId,
    /// Epoch ms removal marker; `None` while kept.
    pub marker: Marker,
}

impl SqliteRecord {
    pub fn kept(id: RecordId) -> Self {
        Self { id, marker: None }
    }

    pub fn is_removed(&self) -> bool {
        is_removed(self.marker)
    }
}

/// One conjunctive constraint of a [`SqlScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePredicate {
    /// Marker column is NULL.
    Kept,
    /// Marker column is NOT NULL.
    Removed,
    /// Row id is one of the listed ids.
    IdIn(Vec<RecordId>),
}

impl ScopePredicate {
    fn is_marker_filter(&self) -> bool {
        matches!(self, Self::Kept | Self::Removed)
    }
}

/// Query scope over one table: a conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlScope {
    predicates: Vec<ScopePredicate>,
}

impl SqlScope {
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Restricts the scope to the given ids.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.predicates
            .push(ScopePredicate::IdIn(ids.into_iter().collect()));
        self
    }

    pub fn predicates(&self) -> &[ScopePredicate] {
        &self.predicates
    }

    /// Splits the scope so no part binds more than `max_ids` ids.
    ///
    /// All id lists are intersected into one sorted, de-duplicated list
    /// first; the parts together match exactly the rows the scope matches.
    fn batches(&self, max_ids: usize) -> Vec<SqlScope> {
        let mut ids: Option<BTreeSet<RecordId>> = None;
        let mut others = Vec::new();
        for predicate in &self.predicates {
            match predicate {
                ScopePredicate::IdIn(list) => {
                    let list: BTreeSet<RecordId> = list.iter().copied().collect();
                    ids = Some(match ids {
                        None => list,
                        Some(current) => current.intersection(&list).copied().collect(),
                    });
                }
                other => others.push(other.clone()),
            }
        }

        let ids = match ids {
            Some(ids) if ids.len() > max_ids => ids.into_iter().collect::<Vec<_>>(),
            _ => return vec![self.clone()],
        };
        ids.chunks(max_ids)
            .map(|chunk| {
                let mut predicates = others.clone();
                predicates.push(ScopePredicate::IdIn(chunk.to_vec()));
                SqlScope { predicates }
            })
            .collect()
    }

    fn where_clause(&self, marker_column: &str) -> (String, Vec<Value>) {
        let mut clause = String::from("1 = 1");
        let mut bind_values = Vec::new();

        for predicate in &self.predicates {
            match predicate {
                ScopePredicate::Kept => {
                    clause.push_str(&format!(" AND {marker_column} IS NULL"));
                }
                ScopePredicate::Removed => {
                    clause.push_str(&format!(" AND {marker_column} IS NOT NULL"));
                }
                ScopePredicate::IdIn(ids) if ids.is_empty() => {
                    clause.push_str(" AND 0 = 1");
                }
                ScopePredicate::IdIn(ids) => {
                    let placeholders = vec!["?"; ids.len()].join(", ");
                    clause.push_str(&format!(" AND {ID_COLUMN} IN ({placeholders})"));
                    bind_values.extend(ids.iter().map(|id| Value::Text(id.to_string())));
                }
            }
        }

        (clause, bind_values)
    }
}

impl QueryScope for SqlScope {
    fn filter_kept(mut self) -> Self {
        self.predicates.push(ScopePredicate::Kept);
        self
    }

    fn filter_removed(mut self) -> Self {
        self.predicates.push(ScopePredicate::Removed);
        self
    }

    fn lift_marker_filter(mut self) -> Self {
        self.predicates
            .retain(|predicate| !predicate.is_marker_filter());
        self
    }
}

/// SQLite-backed marker store bound to one table.
pub struct SqliteMarkerStore<'conn> {
    conn: &'conn Connection,
    table: String,
    marker_column: String,
    has_updated_at: bool,
    save_hooks: SaveHooks<SqliteRecord>,
}

impl<'conn> SqliteMarkerStore<'conn> {
    /// Binds the store to `table`, verifying the columns it needs.
    pub fn try_new(
        conn: &'conn Connection,
        table: &str,
        config: &RecordTypeConfig,
    ) -> StoreResult<Self> {
        let table = table.trim();
        if !is_valid_identifier(table) {
            return Err(StoreError::InvalidTableName(table.to_string()));
        }
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table.to_string()));
        }

        let marker_column = config.marker_column();
        for column in [ID_COLUMN, marker_column] {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }

        Ok(Self {
            conn,
            table: table.to_string(),
            marker_column: marker_column.to_string(),
            has_updated_at: table_has_column(conn, table, UPDATED_AT_COLUMN)?,
            save_hooks: SaveHooks::new(),
        })
    }

    /// Installs the store-level before/after-save chain.
    pub fn with_save_hooks(mut self, save_hooks: SaveHooks<SqliteRecord>) -> Self {
        self.save_hooks = save_hooks;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn marker_column(&self) -> &str {
        &self.marker_column
    }

    /// Inserts one kept row and returns its record.
    pub fn insert_kept(&self, id: RecordId) -> StoreResult<SqliteRecord> {
        let record = SqliteRecord::kept(id);
        self.insert(&record)?;
        Ok(record)
    }

    /// Inserts one row with the record's id and marker.
    ///
    /// Other columns take their table defaults.
    pub fn insert(&self, record: &SqliteRecord) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({ID_COLUMN}, {}) VALUES (?1, ?2);",
                self.table, self.marker_column
            ),
            params![record.id.to_string(), record.marker],
        )?;
        Ok(())
    }

    /// Loads one record by id if it is visible in `scope`.
    pub fn find(&self, id: RecordId, scope: &SqlScope) -> StoreResult<Option<SqliteRecord>> {
        let scope = scope.clone().with_ids([id]);
        Ok(self.load(&scope)?.into_iter().next())
    }

    /// Loads every record visible in `scope`, ordered by id.
    pub fn load(&self, scope: &SqlScope) -> StoreResult<Vec<SqliteRecord>> {
        let mut records = Vec::new();
        for batch in scope.batches(MAX_IDS_PER_STATEMENT) {
            records.extend(self.load_batch(&batch)?);
        }
        Ok(records)
    }

    fn load_batch(&self, scope: &SqlScope) -> StoreResult<Vec<SqliteRecord>> {
        let (clause, bind_values) = scope.where_clause(&self.marker_column);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ID_COLUMN}, {} FROM {} WHERE {clause} ORDER BY {ID_COLUMN} ASC;",
            self.marker_column, self.table
        ))?;

        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.parse_record(row)?);
        }
        Ok(records)
    }

    /// Counts records visible in `scope`.
    pub fn count(&self, scope: &SqlScope) -> StoreResult<usize> {
        let mut total = 0;
        for batch in scope.batches(MAX_IDS_PER_STATEMENT) {
            let (clause, bind_values) = batch.where_clause(&self.marker_column);
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {clause};", self.table),
                params_from_iter(bind_values),
                |row| row.get(0),
            )?;
            total += usize::try_from(count)
                .map_err(|_| StoreError::InvalidData(format!("negative row count `{count}`")))?;
        }
        Ok(total)
    }

    fn parse_record(&self, row: &Row<'_>) -> StoreResult<SqliteRecord> {
        let id_text: String = row.get(0)?;
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid uuid value `{id_text}` in {}.{ID_COLUMN}",
                self.table
            ))
        })?;
        Ok(SqliteRecord {
            id,
            marker: row.get(1)?,
        })
    }

    fn write_marker(&self, id: RecordId, value: Marker, touch_updated_at: bool) -> StoreResult<()> {
        let sql = if touch_updated_at && self.has_updated_at {
            format!(
                "UPDATE {} SET {} = ?1, {UPDATED_AT_COLUMN} = (strftime('%s', 'now') * 1000) WHERE {ID_COLUMN} = ?2;",
                self.table, self.marker_column
            )
        } else {
            format!(
                "UPDATE {} SET {} = ?1 WHERE {ID_COLUMN} = ?2;",
                self.table, self.marker_column
            )
        };

        let changed = self.conn.execute(&sql, params![value, id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn bulk_set_marker_batch(
        &self,
        conn: &Connection,
        scope: &SqlScope,
        value: Marker,
    ) -> StoreResult<usize> {
        let (clause, scope_values) = scope.where_clause(&self.marker_column);
        let mut bind_values = Vec::with_capacity(scope_values.len() + 1);
        bind_values.push(value.map_or(Value::Null, Value::Integer));
        bind_values.extend(scope_values);

        Ok(conn.execute(
            &format!(
                "UPDATE {} SET {} = ? WHERE {clause};",
                self.table, self.marker_column
            ),
            params_from_iter(bind_values),
        )?)
    }
}

impl MarkerStore for SqliteMarkerStore<'_> {
    type Record = SqliteRecord;
    type Scope = SqlScope;

    fn unscoped(&self) -> SqlScope {
        SqlScope::unscoped()
    }

    fn get_marker(&self, record: &SqliteRecord) -> Marker {
        record.marker
    }

    fn set_marker_hooked(&self, record: &mut SqliteRecord, value: Marker) -> StoreResult<bool> {
        let candidate = SqliteRecord {
            id: record.id,
            marker: value,
        };
        if self.save_hooks.run_guards(&candidate).is_abort() {
            debug!(
                "event=marker_write module=store status=aborted table={} path=hooked",
                self.table
            );
            return Ok(false);
        }

        self.write_marker(record.id, value, true)?;
        record.marker = value;
        self.save_hooks.run_observers(record);
        Ok(true)
    }

    fn set_marker_direct(&self, record: &mut SqliteRecord, value: Marker) -> StoreResult<bool> {
        self.write_marker(record.id, value, false)?;
        record.marker = value;
        Ok(true)
    }

    fn bulk_set_marker(&self, scope: &SqlScope, value: Marker) -> StoreResult<usize> {
        let batches = scope.batches(MAX_IDS_PER_STATEMENT);
        let changed = if batches.len() > 1 {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            let mut changed = 0;
            for batch in &batches {
                changed += self.bulk_set_marker_batch(&tx, batch, value)?;
            }
            tx.commit()?;
            changed
        } else {
            batches
                .iter()
                .map(|batch| self.bulk_set_marker_batch(self.conn, batch, value))
                .sum::<StoreResult<usize>>()?
        };

        debug!(
            "event=marker_bulk_write module=store status=ok table={} rows={changed} batches={}",
            self.table,
            batches.len()
        );
        Ok(changed)
    }
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
