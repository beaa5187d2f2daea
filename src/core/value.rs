//! Purpose: Typed views over attribute maps plus a shared registry of computed fields.
//! Exports: `ValueReader`, `ValueWriter`, `ValueDefiner`, `AnyValue`.
//! Role: The accessor surface callers use for every scanned or outbound record.
//! Invariants: Readers sharing a definer see every registration, including later ones.
//! Invariants: Resolving a key with no definition panics; it is a programming error.
//! Notes: The registry is `Rc<RefCell<..>>`; rows from one scan stay on one thread.
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::core::attr::{self, AttributeMap};

/// Result of a computed field. Use [`ValueReader::get_as`] to downcast.
pub type AnyValue = Box<dyn Any>;

type DefFn = Rc<dyn Fn(&ValueReader) -> AnyValue>;

/// Registry of computed fields, cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct ValueDefiner {
    defs: Rc<RefCell<HashMap<String, DefFn>>>,
}

impl ValueDefiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `key`, replacing any earlier definition.
    ///
    /// `f` returns the value itself; boxing into [`AnyValue`] happens here.
    pub fn define<T, F>(&self, key: impl Into<String>, f: F)
    where
        T: Any,
        F: Fn(&ValueReader) -> T + 'static,
    {
        let def: DefFn = Rc::new(move |reader| Box::new(f(reader)) as AnyValue);
        self.defs.borrow_mut().insert(key.into(), def);
    }

    /// Runs the definition for `key` against `reader`.
    ///
    /// # Panics
    ///
    /// Panics with `missing def for: <key>` when nothing is registered under `key`.
    pub fn resolve(&self, key: &str, reader: &ValueReader) -> AnyValue {
        // Release the registry borrow before running user code: definitions may
        // resolve or register other keys.
        let def = self.defs.borrow().get(key).cloned();
        match def {
            Some(def) => def(reader),
            None => panic!("missing def for: {key}"),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.defs.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.defs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.borrow().is_empty()
    }

    pub fn shares_registry_with(&self, other: &ValueDefiner) -> bool {
        Rc::ptr_eq(&self.defs, &other.defs)
    }
}

impl fmt::Debug for ValueDefiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defs = self.defs.borrow();
        let mut keys = defs.keys().collect::<Vec<_>>();
        keys.sort();
        f.debug_struct("ValueDefiner").field("keys", &keys).finish()
    }
}

/// Read-only typed access to one record.
#[derive(Debug)]
pub struct ValueReader {
    item: AttributeMap,
    definer: ValueDefiner,
}

impl ValueReader {
    /// Reader with its own private registry.
    pub fn new(item: AttributeMap) -> Self {
        Self::with_definer(item, ValueDefiner::new())
    }

    pub fn with_definer(item: AttributeMap, definer: ValueDefiner) -> Self {
        Self { item, definer }
    }

    pub fn str(&self, key: &str) -> &str {
        attr::read_str(Some(&self.item), key)
    }

    pub fn int(&self, key: &str) -> i64 {
        attr::read_int(Some(&self.item), key)
    }

    /// Resolves a computed field through the shared registry.
    ///
    /// # Panics
    ///
    /// Panics when `key` has no definition.
    pub fn get(&self, key: &str) -> AnyValue {
        self.definer.resolve(key, self)
    }

    /// [`get`](Self::get) followed by a downcast; `None` when the definition
    /// produced a different type.
    pub fn get_as<T: Any>(&self, key: &str) -> Option<T> {
        self.get(key).downcast::<T>().ok().map(|value| *value)
    }

    pub fn define<T, F>(&self, key: impl Into<String>, f: F)
    where
        T: Any,
        F: Fn(&ValueReader) -> T + 'static,
    {
        self.definer.define(key, f);
    }

    pub fn definer(&self) -> &ValueDefiner {
        &self.definer
    }

    pub fn item(&self) -> &AttributeMap {
        &self.item
    }

    pub fn into_item(self) -> AttributeMap {
        self.item
    }
}

/// Write-only typed access to a record under construction.
#[derive(Debug)]
pub struct ValueWriter<'a> {
    item: &'a mut AttributeMap,
}

impl<'a> ValueWriter<'a> {
    pub fn new(item: &'a mut AttributeMap) -> Self {
        Self { item }
    }

    pub fn str(&mut self, key: &str, value: &str) -> &mut Self {
        attr::write_str(self.item, key, value);
        self
    }

    pub fn int(&mut self, key: &str, value: i64) -> &mut Self {
        attr::write_int(self.item, key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ValueDefiner, ValueReader, ValueWriter};
    use crate::core::attr::{AttributeMap, AttributeValue};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use time::macros::{date, format_description};

    fn item(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn reader_zero_values() {
        let reader = ValueReader::new(AttributeMap::new());
        assert_eq!(reader.str("s"), "");
        assert_eq!(reader.int("i"), 0);

        reader.define("d", |_| "ok");
        assert_eq!(reader.get_as::<&str>("d"), Some("ok"));
    }

    #[test]
    fn reader_good_values() {
        let reader = ValueReader::new(item(&[
            ("s", AttributeValue::string("hello")),
            ("i", AttributeValue::N("33".to_string())),
            ("d", AttributeValue::string("2015-09-16")),
        ]));
        assert_eq!(reader.str("s"), "hello");
        assert_eq!(reader.int("i"), 33);

        reader.define("d", |r| {
            time::Date::parse(r.str("d"), format_description!("[year]-[month]-[day]")).ok()
        });
        assert_eq!(
            reader.get_as::<Option<time::Date>>("d"),
            Some(Some(date!(2015 - 09 - 16)))
        );
    }

    #[test]
    #[should_panic(expected = "missing def for: nope")]
    fn get_without_definition_panics() {
        let reader = ValueReader::new(AttributeMap::new());
        reader.get("nope");
    }

    #[test]
    fn panic_message_names_the_key() {
        let reader = ValueReader::new(AttributeMap::new());
        let payload = catch_unwind(AssertUnwindSafe(|| {
            reader.get("created_at");
        }))
        .expect_err("panic");
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .unwrap_or_default();
        assert_eq!(message, "missing def for: created_at");
    }

    #[test]
    fn late_definition_is_visible_to_existing_readers() {
        let definer = ValueDefiner::new();
        let first = ValueReader::with_definer(
            item(&[("n", AttributeValue::number(2))]),
            definer.clone(),
        );
        let second = ValueReader::with_definer(
            item(&[("n", AttributeValue::number(5))]),
            definer.clone(),
        );

        definer.define("double", |r| r.int("n") * 2);
        assert_eq!(first.get_as::<i64>("double"), Some(4));
        assert_eq!(second.get_as::<i64>("double"), Some(10));
    }

    #[test]
    fn define_through_one_reader_reaches_siblings() {
        let definer = ValueDefiner::new();
        let first = ValueReader::with_definer(AttributeMap::new(), definer.clone());
        let second = ValueReader::with_definer(
            item(&[("name", AttributeValue::string("bob"))]),
            definer,
        );

        first.define("greeting", |r| format!("hi {}", r.str("name")));
        assert_eq!(
            second.get_as::<String>("greeting").as_deref(),
            Some("hi bob")
        );
        assert!(first.definer().shares_registry_with(second.definer()));
    }

    #[test]
    fn redefinition_overwrites() {
        let reader = ValueReader::new(AttributeMap::new());
        reader.define("v", |_| 1_i64);
        reader.define("v", |_| 2_i64);
        assert_eq!(reader.get_as::<i64>("v"), Some(2));
        assert_eq!(reader.definer().len(), 1);
    }

    #[test]
    fn definitions_can_build_on_each_other() {
        let reader = ValueReader::new(item(&[("n", AttributeValue::number(3))]));
        reader.define("square", |r| r.int("n") * r.int("n"));
        reader.define("square_plus_one", |r| {
            r.get_as::<i64>("square").unwrap_or_default() + 1
        });
        assert_eq!(reader.get_as::<i64>("square_plus_one"), Some(10));
    }

    #[test]
    fn get_as_wrong_type_is_none() {
        let reader = ValueReader::new(AttributeMap::new());
        reader.define("v", |_| 1_i64);
        assert_eq!(reader.get_as::<String>("v"), None);
    }

    #[test]
    fn writer_zero_values() {
        let mut map = AttributeMap::new();
        ValueWriter::new(&mut map).str("s", "").int("i", 0);
        assert_eq!(map, item(&[("i", AttributeValue::N("0".to_string()))]));
    }

    #[test]
    fn writer_good_values() {
        let mut map = AttributeMap::new();
        let mut writer = ValueWriter::new(&mut map);
        writer.str("s", "hello");
        writer.int("i", 33);
        assert_eq!(
            map,
            item(&[
                ("s", AttributeValue::string("hello")),
                ("i", AttributeValue::N("33".to_string())),
            ])
        );
    }

    #[test]
    fn definer_debug_lists_keys() {
        let definer = ValueDefiner::new();
        definer.define("b", |_| ());
        definer.define("a", |_| ());
        assert_eq!(format!("{definer:?}"), r#"ValueDefiner { keys: ["a", "b"] }"#);
        assert!(definer.contains("a"));
        assert!(!definer.is_empty());
    }
}
