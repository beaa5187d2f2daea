//! Purpose: In-process `Store` implementation with store-like table semantics.
//! Exports: `MemoryStore`, `TableInfo`.
//! Role: Backs the development server and lets callers exercise accessors offline.
//! Invariants: Clones share one table map; all access goes through one `RwLock`.
//! Invariants: Missing tables are `NotFound`; duplicate creates are `AlreadyExists`.
//! Invariants: Puts replace any item with the same hash key value; number keys
//! compare by numeric value, so `1` and `1.0` name one item.
//! Invariants: A poisoned lock surfaces as `Internal` from every operation.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;

use crate::core::attr::{AttributeMap, AttributeValue};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{KeyType, ScanOutput, Select, Store, TableDef};

#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub def: TableDef,
    pub item_count: u64,
    pub created_at: OffsetDateTime,
}

struct MemoryTable {
    def: TableDef,
    created_at: OffsetDateTime,
    items: BTreeMap<String, AttributeMap>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> Result<Vec<String>, Error> {
        let mut names = self.read()?.keys().cloned().collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub fn table_info(&self, table: &str) -> Result<TableInfo, Error> {
        let tables = self.read()?;
        let entry = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(TableInfo {
            def: entry.def.clone(),
            item_count: entry.items.len() as u64,
            created_at: entry.created_at,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryTable>>, Error> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryTable>>, Error> {
        self.tables.write().map_err(|_| poisoned())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryStore");
        match self.table_names() {
            Ok(names) => debug.field("tables", &names),
            Err(_) => debug.field("tables", &"<poisoned>"),
        };
        debug.finish()
    }
}

impl Store for MemoryStore {
    fn scan(&self, table: &str, select: Select) -> Result<ScanOutput, Error> {
        let tables = self.read()?;
        let entry = tables.get(table).ok_or_else(|| missing_table(table))?;
        let count = entry.items.len() as u64;
        let items = match select {
            Select::Count => Vec::new(),
            Select::AllAttributes => entry.items.values().cloned().collect(),
        };
        Ok(ScanOutput { count, items })
    }

    fn put_item(&self, table: &str, item: AttributeMap) -> Result<(), Error> {
        let mut tables = self.write()?;
        let entry = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let key = key_value(&entry.def, &item)?;
        entry.items.insert(key, item);
        Ok(())
    }

    fn create_table(&self, def: &TableDef) -> Result<(), Error> {
        if def.name.is_empty() || def.key.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table name and key attribute must not be empty"));
        }
        let mut tables = self.write()?;
        if tables.contains_key(&def.name) {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("table already exists")
                .with_table(&def.name));
        }
        tables.insert(
            def.name.clone(),
            MemoryTable {
                def: def.clone(),
                created_at: OffsetDateTime::now_utc(),
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<(), Error> {
        let mut tables = self.write()?;
        match tables.remove(table) {
            Some(_) => Ok(()),
            None => Err(missing_table(table)),
        }
    }
}

fn key_value(def: &TableDef, item: &AttributeMap) -> Result<String, Error> {
    match (def.key_type, item.get(&def.key)) {
        (KeyType::String, Some(AttributeValue::S(value))) if !value.is_empty() => Ok(value.clone()),
        (KeyType::Number, Some(AttributeValue::N(value))) => number_key(def, value),
        (_, Some(other)) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "key attribute {} must be type {}, got {}",
                    def.key,
                    def.key_type.as_tag(),
                    other.type_tag()
                ))
                .with_table(&def.name));
        }
        (_, None) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("item is missing key attribute {}", def.key))
                .with_table(&def.name));
        }
    }
}

/// Canonical text for a number key; rejects values that are not finite.
fn number_key(def: &TableDef, raw: &str) -> Result<String, Error> {
    match raw.trim().parse::<f64>() {
        // Adding zero folds -0 into 0.
        Ok(value) if value.is_finite() => Ok((value + 0.0).to_string()),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "key attribute {} must be a finite number, got {raw:?}",
                def.key
            ))
            .with_table(&def.name)),
    }
}

fn missing_table(table: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message("table does not exist")
        .with_table(table)
}

fn poisoned() -> Error {
    Error::new(ErrorKind::Internal).with_message("memory store lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::core::attr::{AttributeMap, AttributeValue};
    use crate::core::error::ErrorKind;
    use crate::core::store::{KeyType, Select, Store, TableDef};

    fn users() -> TableDef {
        TableDef::new("users", "id", KeyType::String)
    }

    fn user(id: &str, name: &str) -> AttributeMap {
        AttributeMap::from([
            ("id".to_string(), AttributeValue::string(id)),
            ("name".to_string(), AttributeValue::string(name)),
        ])
    }

    #[test]
    fn scan_missing_table_is_not_found() {
        let store = MemoryStore::new();
        let err = store.scan("users", Select::Count).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.table(), Some("users"));
    }

    #[test]
    fn create_put_scan() {
        let store = MemoryStore::new();
        store.create_table(&users()).expect("create");
        store.put_item("users", user("1", "ada")).expect("put");
        store.put_item("users", user("2", "grace")).expect("put");

        let count = store.scan("users", Select::Count).expect("count");
        assert_eq!(count.count, 2);
        assert!(count.items.is_empty());

        let all = store.scan("users", Select::AllAttributes).expect("scan");
        assert_eq!(all.count, 2);
        assert_eq!(all.items.len(), 2);
    }

    #[test]
    fn put_replaces_same_key() {
        let store = MemoryStore::new();
        store.create_table(&users()).expect("create");
        store.put_item("users", user("1", "ada")).expect("put");
        store.put_item("users", user("1", "lovelace")).expect("put");

        let all = store.scan("users", Select::AllAttributes).expect("scan");
        assert_eq!(all.items, vec![user("1", "lovelace")]);
    }

    #[test]
    fn put_validates_key_attribute() {
        let store = MemoryStore::new();
        store.create_table(&users()).expect("create");

        let err = store
            .put_item("users", AttributeMap::new())
            .expect_err("missing key");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let wrong_type = AttributeMap::from([("id".to_string(), AttributeValue::number(1))]);
        let err = store.put_item("users", wrong_type).expect_err("wrong type");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = store.put_item("orders", user("1", "ada")).expect_err("missing table");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_twice_and_delete_missing() {
        let store = MemoryStore::new();
        store.create_table(&users()).expect("create");
        let err = store.create_table(&users()).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        store.delete_table("users").expect("delete");
        let err = store.delete_table("users").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn table_info_reports_items() {
        let store = MemoryStore::new();
        store
            .create_table(&TableDef::new("scores", "n", KeyType::Number))
            .expect("create");
        store
            .put_item(
                "scores",
                AttributeMap::from([("n".to_string(), AttributeValue::number(-3))]),
            )
            .expect("put");
        let info = store.table_info("scores").expect("info");
        assert_eq!(info.def.key_type, KeyType::Number);
        assert_eq!(info.item_count, 1);
        assert_eq!(store.table_names().expect("names"), vec!["scores".to_string()]);
    }

    fn score(n: &str, label: &str) -> AttributeMap {
        AttributeMap::from([
            ("n".to_string(), AttributeValue::N(n.to_string())),
            ("label".to_string(), AttributeValue::string(label)),
        ])
    }

    #[test]
    fn number_keys_compare_by_value() {
        let store = MemoryStore::new();
        store
            .create_table(&TableDef::new("scores", "n", KeyType::Number))
            .expect("create");
        store.put_item("scores", score("1", "first")).expect("put");
        store.put_item("scores", score("1.0", "second")).expect("put");
        store.put_item("scores", score("1e0", "third")).expect("put");
        store.put_item("scores", score("-0", "zero")).expect("put");
        store.put_item("scores", score("0", "zero again")).expect("put");

        let all = store.scan("scores", Select::AllAttributes).expect("scan");
        assert_eq!(all.count, 2);
        assert!(all.items.contains(&score("1e0", "third")));
        assert!(all.items.contains(&score("0", "zero again")));
    }

    #[test]
    fn number_keys_must_be_finite() {
        let store = MemoryStore::new();
        store
            .create_table(&TableDef::new("scores", "n", KeyType::Number))
            .expect("create");
        for raw in ["NaN", "inf", "-infinity", "1e400", "abc", ""] {
            let err = store.put_item("scores", score(raw, "bad")).expect_err(raw);
            assert_eq!(err.kind(), ErrorKind::Usage, "{raw}");
        }
        assert_eq!(store.scan("scores", Select::Count).expect("count").count, 0);
    }

    #[test]
    fn poisoned_lock_is_internal_error() {
        let store = MemoryStore::new();
        store.create_table(&users()).expect("create");
        let shared = store.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = shared.tables.write().expect("lock");
            panic!("writer crashed while holding the table lock");
        })
        .join();
        assert!(crashed.is_err());

        let err = store.table_names().expect_err("poisoned");
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err = store.scan("users", Select::Count).expect_err("poisoned");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(format!("{store:?}").contains("<poisoned>"));
    }
}
