//! Purpose: Hold top-level CLI command dispatch for `dynamis`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only `serve` starts a tokio runtime; other commands are blocking calls.

use super::*;
use dynamis::api::{self, AttributeMap, OnError, Table, TableSchema};

pub(super) fn dispatch_command(command: Command, store: StoreArgs) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "dynamis", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Count { table } => {
            let handle = Table::connect(&store.config()?, &table)?;
            let count = handle.try_row_count()?;
            emit_json(json!({ "table": table, "count": count }));
            Ok(RunOutcome::ok())
        }
        Command::Scan { table } => {
            let handle = Table::connect(&store.config()?, &table)?;
            let (rows, _definer) = handle.try_rows()?;
            let count = rows.len();
            let items = rows
                .into_iter()
                .map(|row| row.into_reader().into_item())
                .collect::<Vec<_>>();
            let items = serde_json::to_value(&items).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode items")
                    .with_source(err)
            })?;
            emit_json(json!({ "table": table, "count": count, "items": items }));
            Ok(RunOutcome::ok())
        }
        Command::Put { table, strs, ints } => {
            let strs = strs
                .iter()
                .map(|input| parse_assignment("--str", input))
                .collect::<Result<Vec<_>, _>>()?;
            let ints = ints
                .iter()
                .map(|input| parse_int_assignment(input))
                .collect::<Result<Vec<_>, _>>()?;
            if strs.is_empty() && ints.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("put requires at least one attribute")
                    .with_hint("Use --str KEY=VALUE or --int KEY=N."));
            }

            let fill = |w: &mut api::ValueWriter<'_>| {
                for (key, value) in &strs {
                    w.str(key, value);
                }
                for (key, value) in &ints {
                    w.int(key, *value);
                }
            };
            let mut preview = AttributeMap::new();
            fill(&mut api::ValueWriter::new(&mut preview));

            let handle = Table::connect(&store.config()?, &table)?;
            handle.put(fill)?;
            emit_json(json!({ "table": table, "attributes": preview.len() }));
            Ok(RunOutcome::ok())
        }
        Command::CreateTable {
            names,
            key,
            key_type,
            continue_on_error,
        } => {
            let key_type = KeyType::from(key_type);
            let units = names
                .iter()
                .map(|name| TableSchema::new(name, &key, key_type))
                .collect::<Vec<_>>();
            let config = store.config()?;
            api::create(&config, &units, OnError::from_abort(!continue_on_error))?;
            emit_json(json!({ "create": names }));
            Ok(RunOutcome::ok())
        }
        Command::DeleteTable {
            names,
            continue_on_error,
        } => {
            // Key details are irrelevant to deletion.
            let units = names
                .iter()
                .map(|name| TableSchema::new(name, "", KeyType::String))
                .collect::<Vec<_>>();
            let config = store.config()?;
            api::delete(&config, &units, OnError::from_abort(!continue_on_error))?;
            emit_json(json!({ "delete": names }));
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            allow_non_loopback,
        } => {
            let config = serve::ServeConfig {
                bind: parse_bind(&bind)?,
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}
