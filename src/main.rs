//! Purpose: `dynamis` CLI entry point.
//! Role: Binary crate root; parses args, initialises logging, runs commands, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON value on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Table lifecycle commands go through the schema orchestrator.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::net::SocketAddr;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;

use dynamis::api::{Error, ErrorKind, KeyType, StoreConfig, to_exit_code};
use dynamis::config::{ENDPOINT_ENV, REGION_ENV};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    let default_level = match cli.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(cli.log_level.as_deref(), default_level)?;

    let store = StoreArgs {
        endpoint: cli.endpoint,
        region: cli.region,
    };
    command_dispatch::dispatch_command(cli.command, store)
}

#[derive(Parser)]
#[command(
    name = "dynamis",
    version,
    about = "Typed attribute access and table lifecycle for DynamoDB-style stores",
    long_about = None,
    after_help = r#"EXAMPLES
  $ dynamis serve --bind 127.0.0.1:8000 &
  $ export DYNAMIS_ENDPOINT=http://127.0.0.1:8000
  $ dynamis create-table users --key id
  $ dynamis put users --str id=ada --int visits=3
  $ dynamis count users
  $ dynamis scan users
  $ dynamis delete-table users

ENVIRONMENT
  DYNAMIS_ENDPOINT    store base URL (http or https)
  DYNAMODB_HOSTPORT   store host:port, used when DYNAMIS_ENDPOINT is unset
  DYNAMIS_REGION      region in the credential scope (default us-east-1)
  RUST_LOG            log filter, overridden by --log-level"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = ENDPOINT_ENV,
        help = "Store endpoint, e.g. http://127.0.0.1:8000"
    )]
    endpoint: Option<String>,
    #[arg(long, global = true, env = REGION_ENV, help = "Region for the credential scope")]
    region: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Log filter for stderr diagnostics (e.g. debug, dynamis=trace)"
    )]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KeyTypeCli {
    String,
    Number,
}

impl From<KeyTypeCli> for KeyType {
    fn from(value: KeyTypeCli) -> Self {
        match value {
            KeyTypeCli::String => KeyType::String,
            KeyTypeCli::Number => KeyType::Number,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Count the items in a table")]
    Count {
        #[arg(help = "Table name")]
        table: String,
    },
    #[command(about = "Print every item in a table as store JSON")]
    Scan {
        #[arg(help = "Table name")]
        table: String,
    },
    #[command(
        about = "Write one item",
        after_help = r#"EXAMPLES
  $ dynamis put users --str id=ada --str team=core --int visits=3

Empty string values are skipped; integers are always written."#
    )]
    Put {
        #[arg(help = "Table name")]
        table: String,
        #[arg(long = "str", value_name = "KEY=VALUE", help = "String attribute (repeatable)")]
        strs: Vec<String>,
        #[arg(long = "int", value_name = "KEY=N", help = "Integer attribute (repeatable)")]
        ints: Vec<String>,
    },
    #[command(about = "Create tables with a single hash key")]
    CreateTable {
        #[arg(required = true, help = "Table names")]
        names: Vec<String>,
        #[arg(long, help = "Hash key attribute name")]
        key: String,
        #[arg(long, value_enum, default_value = "string", help = "Hash key type")]
        key_type: KeyTypeCli,
        #[arg(long, help = "Keep going after a failed table; always exits 0")]
        continue_on_error: bool,
    },
    #[command(about = "Delete tables")]
    DeleteTable {
        #[arg(required = true, help = "Table names")]
        names: Vec<String>,
        #[arg(long, help = "Keep going after a failed table; always exits 0")]
        continue_on_error: bool,
    },
    #[command(about = "Run an in-memory development store")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000", help = "Address to listen on")]
        bind: String,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Store selection from global flags; falls back to the environment.
struct StoreArgs {
    endpoint: Option<String>,
    region: Option<String>,
}

impl StoreArgs {
    fn config(&self) -> Result<StoreConfig, Error> {
        let config = match self.endpoint.as_deref().filter(|value| !value.trim().is_empty()) {
            Some(endpoint) => StoreConfig::remote(endpoint)?,
            None => StoreConfig::from_env()?,
        };
        Ok(match &self.region {
            Some(region) => config.with_region(region),
            None => config,
        })
    }
}

fn init_tracing(level: Option<&str>, default_level: &str) -> Result<(), Error> {
    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid --log-level: {level}"))
                .with_hint("Use a level like warn, info, or debug.")
                .with_source(err)
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
    Ok(())
}

fn parse_bind(bind: &str) -> Result<SocketAddr, Error> {
    bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:8000.")
    })
}

/// Splits `key=value`; the key must be non-empty.
fn parse_assignment<'a>(flag: &str, input: &'a str) -> Result<(&'a str, &'a str), Error> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid {flag} value: {input}"))
            .with_hint(format!("Use {flag} KEY=VALUE."))),
    }
}

fn parse_int_assignment<'a>(input: &'a str) -> Result<(&'a str, i64), Error> {
    let (key, value) = parse_assignment("--int", input)?;
    let value = value.trim().parse::<i64>().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid integer for {key}: {value}"))
            .with_hint("Use a base-10 signed 64-bit integer.")
            .with_source(err)
    })?;
    Ok((key, value))
}

fn emit_json(value: Value) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Throttled => "request throttled".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Protocol => "unexpected store response".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(table) = err.table() {
        lines.push(format!("table: {table}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `dynamis --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "dynamis") else {
        return "Try `dynamis --help`.".to_string();
    };

    let parts = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect::<Vec<_>>();

    if parts.is_empty() {
        return "Try `dynamis --help`.".to_string();
    }
    format!("Try `dynamis {} --help`.", parts.join(" "))
}
