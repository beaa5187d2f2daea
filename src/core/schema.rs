//! Purpose: Drive create/delete across independent schema units.
//! Exports: `Schema`, `OnError`, `create`, `delete`.
//! Role: Batch lifecycle for the tables an application owns.
//! Invariants: Units run strictly in the order given; no retries and no rollback.
//! Invariants: `OnError::Abort` stops at the first failure and returns it.
//! Invariants: `OnError::Continue` visits every unit and always returns `Ok(())`.
//! Notes: Repeated `Continue` runs converge only if each unit's own create/delete
//! tolerates already being in the target state.
use crate::config::StoreConfig;
use crate::core::error::Error;

/// One independently managed table (or set of tables).
pub trait Schema {
    /// Ensure the unit exists. Errors if it already exists or creation fails.
    fn create(&self, config: &StoreConfig) -> Result<(), Error>;

    /// Ensure the unit is gone. Errors if it does not exist or deletion fails.
    fn delete(&self, config: &StoreConfig) -> Result<(), Error>;

    /// Label used in progress logs.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl<T: Schema + ?Sized> Schema for Box<T> {
    fn create(&self, config: &StoreConfig) -> Result<(), Error> {
        (**self).create(config)
    }

    fn delete(&self, config: &StoreConfig) -> Result<(), Error> {
        (**self).delete(config)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: Schema + ?Sized> Schema for &T {
    fn create(&self, config: &StoreConfig) -> Result<(), Error> {
        (**self).create(config)
    }

    fn delete(&self, config: &StoreConfig) -> Result<(), Error> {
        (**self).delete(config)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnError {
    Abort,
    #[default]
    Continue,
}

impl OnError {
    pub fn from_abort(abort_on_error: bool) -> Self {
        if abort_on_error {
            OnError::Abort
        } else {
            OnError::Continue
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Action {
    Create,
    Delete,
}

/// Creates every unit. With [`OnError::Continue`] this is safe to re-run.
pub fn create<S: Schema>(
    config: &StoreConfig,
    schemas: &[S],
    on_error: OnError,
) -> Result<(), Error> {
    run(config, schemas, on_error, Action::Create)
}

/// Deletes every unit. With [`OnError::Continue`] this is safe to re-run.
pub fn delete<S: Schema>(
    config: &StoreConfig,
    schemas: &[S],
    on_error: OnError,
) -> Result<(), Error> {
    run(config, schemas, on_error, Action::Delete)
}

fn run<S: Schema>(
    config: &StoreConfig,
    schemas: &[S],
    on_error: OnError,
    action: Action,
) -> Result<(), Error> {
    for schema in schemas {
        let unit = schema.describe();
        let result = match action {
            Action::Create => {
                tracing::info!(unit = %unit, "creating");
                schema.create(config)
            }
            Action::Delete => {
                tracing::info!(unit = %unit, "deleting");
                schema.delete(config)
            }
        };
        if let Err(err) = result {
            tracing::warn!(unit = %unit, action = ?action, error = %err, "schema unit failed");
            if on_error == OnError::Abort {
                return Err(err);
            }
        }
    }
    Ok(())
}
