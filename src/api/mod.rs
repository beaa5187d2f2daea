//! Purpose: Define the public Rust API boundary for dynamis.
//! Exports: Accessors, row helpers, schema orchestration, store collaborators, config.
//! Role: Stable surface for applications and the CLI; `core` holds the pieces.
//! Invariants: Store collaborators are reachable only through `Store` and `StoreConfig`.
//! Invariants: `wire` is public so servers and clients share one protocol shape.

mod memory;
mod remote;
mod table;
pub mod wire;

pub use crate::config::{Endpoint, StoreConfig};
pub use crate::core::attr::{
    AttributeMap, AttributeValue, read_int, read_str, write_int, write_str,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::rows::{Row, row_count, rows, try_row_count, try_rows};
pub use crate::core::schema::{OnError, Schema, create, delete};
pub use crate::core::store::{KeyType, ScanOutput, Select, Store, TableDef};
pub use crate::core::value::{AnyValue, ValueDefiner, ValueReader, ValueWriter};
pub use memory::{MemoryStore, TableInfo};
pub use remote::RemoteStore;
pub use table::{Table, TableSchema};
