//! Purpose: Library crate behind the `dynamis` CLI and tests.
//! Exports: `api` (public surface), `config` (store endpoints), `core` (accessors, schema, errors).
//! Role: Typed attribute access and table lifecycle over DynamoDB-style stores.
//! Invariants: Application code should import from `api`; `core` layout may change.
pub mod api;
pub mod config;
pub mod core;
