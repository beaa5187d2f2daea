//! Purpose: Table-scoped handle and a ready-made single-table schema unit.
//! Exports: `Table`, `TableSchema`.
//! Role: Convenience layer over `Store` + the row accessors for application code.
//! Invariants: `Table` holds no cached state; every call is one store request.
//! Invariants: `TableSchema` create/delete are not idempotent on their own; the
//! orchestrator's `OnError::Continue` policy is what makes re-runs converge.
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::core::attr::AttributeMap;
use crate::core::error::Error;
use crate::core::rows::{self, Row};
use crate::core::schema::Schema;
use crate::core::store::{KeyType, Store, TableDef};
use crate::core::value::{ValueDefiner, ValueWriter};

#[derive(Clone)]
pub struct Table {
    store: Arc<dyn Store>,
    name: String,
}

impl Table {
    pub fn new(store: Arc<dyn Store>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn connect(config: &StoreConfig, name: impl Into<String>) -> Result<Self, Error> {
        Ok(Self::new(config.connect()?, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> Option<u64> {
        rows::row_count(self.store.as_ref(), &self.name)
    }

    pub fn try_row_count(&self) -> Result<u64, Error> {
        rows::try_row_count(self.store.as_ref(), &self.name)
    }

    pub fn rows(&self) -> Option<(Vec<Row>, ValueDefiner)> {
        rows::rows(self.store.as_ref(), &self.name)
    }

    pub fn try_rows(&self) -> Result<(Vec<Row>, ValueDefiner), Error> {
        rows::try_rows(self.store.as_ref(), &self.name)
    }

    /// Builds one item with `fill` and stores it.
    ///
    /// ```no_run
    /// # fn demo(table: &dynamis::api::Table) -> Result<(), dynamis::api::Error> {
    /// table.put(|w| {
    ///     w.str("id", "ada").int("visits", 3);
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn put<F>(&self, fill: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ValueWriter<'_>),
    {
        let mut item = AttributeMap::new();
        fill(&mut ValueWriter::new(&mut item));
        self.store
            .put_item(&self.name, item)
            .map_err(|err| err.with_table(&self.name))
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish()
    }
}

/// A single hash-keyed table managed by [`create`](crate::core::schema::create)
/// and [`delete`](crate::core::schema::delete).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    def: TableDef,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, key: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            def: TableDef::new(name, key, key_type),
        }
    }

    pub fn def(&self) -> &TableDef {
        &self.def
    }
}

impl Schema for TableSchema {
    fn create(&self, config: &StoreConfig) -> Result<(), Error> {
        config.connect()?.create_table(&self.def)
    }

    fn delete(&self, config: &StoreConfig) -> Result<(), Error> {
        config.connect()?.delete_table(&self.def.name)
    }

    fn describe(&self) -> String {
        format!("table {}", self.def.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Table, TableSchema};
    use crate::api::MemoryStore;
    use crate::config::StoreConfig;
    use crate::core::error::ErrorKind;
    use crate::core::schema::{self, OnError, Schema};
    use crate::core::store::KeyType;
    use time::macros::{date, format_description};

    fn setup(store: &MemoryStore) -> (StoreConfig, Table) {
        let config = StoreConfig::memory(store.clone());
        let units = [TableSchema::new("accessor", "str", KeyType::String)];
        schema::create(&config, &units, OnError::Abort).expect("create");
        let table = Table::connect(&config, "accessor").expect("table");
        (config, table)
    }

    #[test]
    fn row_count_missing_empty_and_filled() {
        let store = MemoryStore::new();
        let config = StoreConfig::memory(store.clone());
        let missing = Table::connect(&config, "accessor").expect("table");
        assert_eq!(missing.row_count(), None);
        assert_eq!(
            missing.try_row_count().expect_err("err").kind(),
            ErrorKind::NotFound
        );

        let (_, table) = setup(&store);
        assert_eq!(table.row_count(), Some(0));

        table
            .put(|w| {
                w.str("str", "one");
            })
            .expect("put");
        assert_eq!(table.row_count(), Some(1));

        for name in ["two", "three"] {
            table
                .put(|w| {
                    w.str("str", name);
                })
                .expect("put");
        }
        assert_eq!(table.row_count(), Some(3));
    }

    #[test]
    fn rows_missing_and_empty() {
        let store = MemoryStore::new();
        let config = StoreConfig::memory(store.clone());
        let missing = Table::connect(&config, "accessor").expect("table");
        assert!(missing.rows().is_none());

        let (_, table) = setup(&store);
        let (rows, definer) = table.rows().expect("rows");
        assert!(rows.is_empty());
        assert!(definer.is_empty());
    }

    #[test]
    fn rows_with_custom_definition() {
        let store = MemoryStore::new();
        let (_, table) = setup(&store);
        table
            .put(|w| {
                w.str("str", "one").int("int", 33).str("date", "2015-09-16");
            })
            .expect("put");

        let (rows, definer) = table.rows().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("str"), "one");
        assert_eq!(rows[0].int("int"), 33);
        assert_eq!(rows[0].str("missing"), "");

        definer.define("parsedate", |r| {
            time::Date::parse(r.str("date"), format_description!("[year]-[month]-[day]")).ok()
        });
        assert_eq!(
            rows[0].get_as::<Option<time::Date>>("parsedate"),
            Some(Some(date!(2015 - 09 - 16)))
        );
    }

    #[test]
    fn put_without_key_is_rejected() {
        let store = MemoryStore::new();
        let (_, table) = setup(&store);
        let err = table
            .put(|w| {
                w.int("int", 1);
            })
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.table(), Some("accessor"));
    }

    #[test]
    fn table_schema_lifecycle_converges_with_continue() {
        let store = MemoryStore::new();
        let config = StoreConfig::memory(store.clone());
        let units = [
            TableSchema::new("users", "id", KeyType::String),
            TableSchema::new("scores", "n", KeyType::Number),
        ];

        schema::create(&config, &units, OnError::Continue).expect("create");
        schema::create(&config, &units, OnError::Continue).expect("re-create");
        assert_eq!(
            store.table_names().expect("names"),
            vec!["scores".to_string(), "users".to_string()]
        );

        let err = schema::create(&config, &units, OnError::Abort).expect_err("exists");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        schema::delete(&config, &units, OnError::Continue).expect("delete");
        schema::delete(&config, &units, OnError::Continue).expect("re-delete");
        assert!(store.table_names().expect("names").is_empty());

        let err = schema::delete(&config, &units, OnError::Abort).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn table_schema_describes_itself() {
        let unit = TableSchema::new("users", "id", KeyType::String);
        assert_eq!(unit.describe(), "table users");
        assert_eq!(unit.def().key, "id");
    }
}
