//! Purpose: `Store` backed by the AWS DynamoDB SDK.
//! Exports: `RemoteStore`.
//! Role: Default collaborator behind `StoreConfig::remote`/`from_env`; works against
//! AWS, DynamoDB Local, and the `dynamis serve` development server.
//! Invariants: Requests are SigV4-signed with the configured credentials and region.
//! Invariants: Each call blocks on a private current-thread runtime; never call from async code.
//! Invariants: Service error codes map to `ErrorKind` via `wire::kind_from_exception`.
//! Notes: SDK retries are disabled; one call is one request.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue as SdkValue, KeySchemaElement, KeyType as SdkKeyType,
    ProvisionedThroughput, ScalarAttributeType, Select as SdkSelect,
};
use aws_smithy_types::base64;
use url::Url;

use super::wire;
use crate::config::{Endpoint, StoreConfig};
use crate::core::attr::{AttributeMap, AttributeValue};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{KeyType, ScanOutput, Select, Store, TableDef};

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<RemoteStoreInner>,
}

struct RemoteStoreInner {
    endpoint: Url,
    region: String,
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl RemoteStore {
    pub fn new(config: &StoreConfig) -> ApiResult<Self> {
        let Endpoint::Http(endpoint) = config.endpoint() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("remote store requires an http endpoint"));
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to start store client runtime")
                    .with_source(err)
            })?;
        let credentials = Credentials::new(
            config.access_key(),
            config.secret_key(),
            config.session_token().map(str::to_string),
            None,
            "dynamis",
        );
        let sdk_config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region().to_string()))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout())
                    .build(),
            )
            .build();
        Ok(Self {
            inner: Arc::new(RemoteStoreInner {
                endpoint: endpoint.clone(),
                region: config.region().to_string(),
                client: Client::from_conf(sdk_config),
                runtime,
            }),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.runtime.block_on(future)
    }
}

impl fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStore")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("region", &self.inner.region)
            .finish()
    }
}

impl Store for RemoteStore {
    fn scan(&self, table: &str, select: Select) -> ApiResult<ScanOutput> {
        let mut request = self.inner.client.scan().table_name(table);
        if select == Select::Count {
            request = request.select(SdkSelect::Count);
        }
        let output = self
            .block_on(request.send())
            .map_err(|err| sdk_error("Scan", err).with_table(table))?;
        if output.last_evaluated_key.is_some() {
            tracing::warn!(
                table,
                count = output.count,
                "scan truncated by the store; later pages are not read"
            );
        }
        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_item)
            .collect();
        Ok(ScanOutput {
            count: u64::try_from(output.count).unwrap_or(0),
            items,
        })
    }

    fn put_item(&self, table: &str, item: AttributeMap) -> ApiResult<()> {
        let request = self
            .inner
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_item(item)));
        self.block_on(request.send())
            .map_err(|err| sdk_error("PutItem", err).with_table(table))?;
        Ok(())
    }

    fn create_table(&self, def: &TableDef) -> ApiResult<()> {
        let attribute_type = match def.key_type {
            KeyType::String => ScalarAttributeType::S,
            KeyType::Number => ScalarAttributeType::N,
        };
        let definition = AttributeDefinition::builder()
            .attribute_name(&def.key)
            .attribute_type(attribute_type)
            .build()
            .map_err(request_error)?;
        let key = KeySchemaElement::builder()
            .attribute_name(&def.key)
            .key_type(SdkKeyType::Hash)
            .build()
            .map_err(request_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(1)
            .write_capacity_units(1)
            .build()
            .map_err(request_error)?;
        let request = self
            .inner
            .client
            .create_table()
            .table_name(&def.name)
            .attribute_definitions(definition)
            .key_schema(key)
            .provisioned_throughput(throughput);
        self.block_on(request.send())
            .map_err(|err| sdk_error("CreateTable", err).with_table(&def.name))?;
        Ok(())
    }

    fn delete_table(&self, table: &str) -> ApiResult<()> {
        let request = self.inner.client.delete_table().table_name(table);
        self.block_on(request.send())
            .map_err(|err| sdk_error("DeleteTable", err).with_table(table))?;
        Ok(())
    }
}

fn request_error(err: impl StdError + Send + Sync + 'static) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("invalid store request")
        .with_source(err)
}

fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    if let Some(service) = err.as_service_error() {
        return service_error(service.code(), service.message());
    }
    let kind = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => ErrorKind::Io,
        SdkError::ResponseError(_) => ErrorKind::Protocol,
        _ => ErrorKind::Internal,
    };
    Error::new(kind).with_message(format!(
        "{operation} request failed: {}",
        DisplayErrorContext(&err)
    ))
}

fn service_error(code: Option<&str>, message: Option<&str>) -> Error {
    let name = code.unwrap_or("UnknownError");
    let name = name.rsplit('#').next().unwrap_or(name);
    let message = match message {
        Some(message) => format!("{name}: {message}"),
        None => name.to_string(),
    };
    Error::new(wire::kind_from_exception(name)).with_message(message)
}

fn to_sdk_item(item: AttributeMap) -> HashMap<String, SdkValue> {
    item.into_iter()
        .map(|(key, value)| (key, to_sdk(value)))
        .collect()
}

fn from_sdk_item(item: HashMap<String, SdkValue>) -> AttributeMap {
    item.into_iter()
        .map(|(key, value)| (key, from_sdk(value)))
        .collect()
}

fn to_sdk(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(value) => SdkValue::S(value),
        AttributeValue::N(value) => SdkValue::N(value),
        AttributeValue::B(value) => SdkValue::B(blob_from_text(&value)),
        AttributeValue::Bool(value) => SdkValue::Bool(value),
        AttributeValue::Null(value) => SdkValue::Null(value),
        AttributeValue::Ss(values) => SdkValue::Ss(values),
        AttributeValue::Ns(values) => SdkValue::Ns(values),
        AttributeValue::Bs(values) => {
            SdkValue::Bs(values.iter().map(|value| blob_from_text(value)).collect())
        }
        AttributeValue::L(values) => SdkValue::L(values.into_iter().map(to_sdk).collect()),
        AttributeValue::M(fields) => SdkValue::M(to_sdk_item(fields)),
    }
}

fn from_sdk(value: SdkValue) -> AttributeValue {
    match value {
        SdkValue::S(value) => AttributeValue::S(value),
        SdkValue::N(value) => AttributeValue::N(value),
        SdkValue::B(blob) => AttributeValue::B(base64::encode(blob.as_ref())),
        SdkValue::Bool(value) => AttributeValue::Bool(value),
        SdkValue::Null(value) => AttributeValue::Null(value),
        SdkValue::Ss(values) => AttributeValue::Ss(values),
        SdkValue::Ns(values) => AttributeValue::Ns(values),
        SdkValue::Bs(blobs) => AttributeValue::Bs(
            blobs
                .iter()
                .map(|blob| base64::encode(blob.as_ref()))
                .collect(),
        ),
        SdkValue::L(values) => AttributeValue::L(values.into_iter().map(from_sdk).collect()),
        SdkValue::M(fields) => AttributeValue::M(from_sdk_item(fields)),
        // Types newer than this client read as absent.
        _ => AttributeValue::Null(true),
    }
}

/// Binary attributes travel as base64 text; text that is not base64 is sent as raw bytes.
fn blob_from_text(text: &str) -> Blob {
    Blob::new(base64::decode(text).unwrap_or_else(|_| text.as_bytes().to_vec()))
}
