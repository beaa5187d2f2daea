// Core modules: attribute codec, typed accessors, scans, schema lifecycle, errors.
pub mod attr;
pub mod error;
pub mod rows;
pub mod schema;
pub mod store;
pub mod value;
