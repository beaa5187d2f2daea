//! Purpose: Provide a DynamoDB JSON 1.0 development server over an in-memory store.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based loopback server so the CLI, tests, and apps can run without a real store.
//! Invariants: Operations are chosen by `X-Amz-Target`; every reply is JSON.
//! Invariants: Errors use the `__type`/`message` envelope; 5xx only for internal failures.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: State lives for the lifetime of the process; nothing is persisted.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use tokio::time::Duration;
use tower_http::trace::TraceLayer;

use dynamis::api::wire::{
    self, CONTENT_TYPE, CreateTableRequest, DeleteTableRequest, ErrorBody, PutItemRequest,
    SELECT_COUNT, ScanRequest, ScanResponse, TARGET_HEADER, TARGET_PREFIX, TableDescription,
    TableDescriptionEnvelope,
};
use dynamis::api::{Error, ErrorKind, MemoryStore, Select, Store, TableInfo};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub allow_non_loopback: bool,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    let store = MemoryStore::new();
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/", post(handle))
        .layer(TraceLayer::new_for_http())
        .with_state(store);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "dynamis dev store listening");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

async fn handle(State(store): State<MemoryStore>, headers: HeaderMap, body: Bytes) -> Response {
    let target = headers
        .get(TARGET_HEADER)
        .and_then(|value| value.to_str().ok());
    match dispatch(&store, target, &body) {
        Ok(payload) => json_response(StatusCode::OK, &payload),
        Err(err) => {
            tracing::debug!(operation = target.unwrap_or_default(), error = %err, "request failed");
            error_response(err)
        }
    }
}

/// Runs one protocol operation against `store` and returns its JSON reply.
fn dispatch(store: &MemoryStore, target: Option<&str>, body: &[u8]) -> Result<Value, Error> {
    let target = target.ok_or_else(|| {
        Error::new(ErrorKind::Protocol).with_message(format!("missing {TARGET_HEADER} header"))
    })?;
    let operation = target.strip_prefix(TARGET_PREFIX).unwrap_or_default();
    match operation {
        "Scan" => {
            let request: ScanRequest = parse_body(body)?;
            let select = match request.select.as_deref() {
                None | Some("ALL_ATTRIBUTES") => Select::AllAttributes,
                Some(SELECT_COUNT) => Select::Count,
                Some(other) => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("unsupported Select value: {other}")));
                }
            };
            let output = store.scan(&request.table_name, select)?;
            to_value(&ScanResponse {
                count: output.count,
                items: output.items,
                last_evaluated_key: None,
            })
        }
        "PutItem" => {
            let request: PutItemRequest = parse_body(body)?;
            store.put_item(&request.table_name, request.item)?;
            Ok(json!({}))
        }
        "CreateTable" => {
            let request: CreateTableRequest = parse_body(body)?;
            let def = request.to_def().ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("table needs one HASH key of type S or N")
                    .with_table(&request.table_name)
            })?;
            store.create_table(&def)?;
            let info = store.table_info(&def.name)?;
            to_value(&describe(&info, "ACTIVE"))
        }
        "DeleteTable" => {
            let request: DeleteTableRequest = parse_body(body)?;
            let info = store.table_info(&request.table_name)?;
            store.delete_table(&request.table_name)?;
            to_value(&describe(&info, "DELETING"))
        }
        _ => Err(Error::new(ErrorKind::Protocol)
            .with_message(format!("unknown operation: {target}"))),
    }
}

fn describe(info: &TableInfo, status: &str) -> TableDescriptionEnvelope {
    let request = CreateTableRequest::from_def(&info.def);
    TableDescriptionEnvelope {
        table_description: TableDescription {
            table_name: info.def.name.clone(),
            table_status: status.to_string(),
            item_count: info.item_count,
            creation_date_time: info.created_at.unix_timestamp_nanos() as f64 / 1e9,
            key_schema: request.key_schema,
            attribute_definitions: request.attribute_definitions,
        },
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message(format!("invalid request body: {err}"))
            .with_source(err)
    })
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, Error> {
    serde_json::to_value(payload).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode response")
            .with_source(err)
    })
}

fn json_response(status: StatusCode, payload: &Value) -> Response {
    let body = payload.to_string();
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Internal | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    let mut message = err.message().unwrap_or("error").to_string();
    if let Some(table) = err.table() {
        message.push_str(&format!(": {table}"));
    }
    let body = ErrorBody {
        kind: format!("{}{}", wire::EXCEPTION_PREFIX, wire::exception_name(err.kind())),
        message: Some(message),
    };
    match serde_json::to_value(&body) {
        Ok(payload) => json_response(status, &payload),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
