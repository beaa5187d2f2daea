//! Purpose: Scan-backed record access: row counts and rows sharing one definer.
//! Exports: `Row`, `row_count`, `try_row_count`, `rows`, `try_rows`.
//! Role: Binds the value accessors to whatever a `Store` scan returns.
//! Invariants: A failed scan is `None`, never a zero count or an empty row list.
//! Invariants: Every row from one scan shares exactly one `ValueDefiner`.
//! Invariants: Row order is the store's scan order; nothing here sorts.
use std::ops::Deref;

use crate::core::error::Error;
use crate::core::store::{Select, Store};
use crate::core::value::{ValueDefiner, ValueReader};

/// One scanned record. Derefs to [`ValueReader`].
#[derive(Debug)]
pub struct Row {
    reader: ValueReader,
}

impl Row {
    pub fn into_reader(self) -> ValueReader {
        self.reader
    }
}

impl Deref for Row {
    type Target = ValueReader;

    fn deref(&self) -> &ValueReader {
        &self.reader
    }
}

pub fn try_row_count(store: &dyn Store, table: &str) -> Result<u64, Error> {
    store
        .scan(table, Select::Count)
        .map(|output| output.count)
        .map_err(|err| err.with_table(table))
}

/// Number of items in `table`, or `None` if the scan failed for any reason
/// (a missing table included). An existing empty table is `Some(0)`.
pub fn row_count(store: &dyn Store, table: &str) -> Option<u64> {
    match try_row_count(store, table) {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::debug!(table, error = %err, "row count scan failed");
            None
        }
    }
}

pub fn try_rows(store: &dyn Store, table: &str) -> Result<(Vec<Row>, ValueDefiner), Error> {
    let output = store
        .scan(table, Select::AllAttributes)
        .map_err(|err| err.with_table(table))?;
    let definer = ValueDefiner::new();
    let rows = output
        .items
        .into_iter()
        .map(|item| Row {
            reader: ValueReader::with_definer(item, definer.clone()),
        })
        .collect();
    Ok((rows, definer))
}

/// Every row in `table` plus the definer they share, or `None` if the scan
/// failed. Definitions registered on the returned definer apply to all rows.
pub fn rows(store: &dyn Store, table: &str) -> Option<(Vec<Row>, ValueDefiner)> {
    match try_rows(store, table) {
        Ok(result) => Some(result),
        Err(err) => {
            tracing::debug!(table, error = %err, "row scan failed");
            None
        }
    }
}
