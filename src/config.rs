//! Purpose: Describe how to reach a store; the `config` handed to schema units.
//! Exports: `StoreConfig`, `Endpoint`, env var names, defaults.
//! Role: Single place where endpoint, region, and client settings are resolved.
//! Invariants: HTTP endpoints are http/https base URLs with no path, query, or fragment.
//! Invariants: `connect` never performs I/O; failures surface on the first request.
//! Notes: Credentials default to a fixed local pair that emulators accept; set
//! real keys (or the standard `AWS_*` variables) for signed AWS access.
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::{MemoryStore, RemoteStore};
use crate::core::error::{Error, ErrorKind};
use crate::core::store::Store;

pub const ENDPOINT_ENV: &str = "DYNAMIS_ENDPOINT";
pub const HOSTPORT_ENV: &str = "DYNAMODB_HOSTPORT";
pub const REGION_ENV: &str = "DYNAMIS_REGION";
pub const ACCESS_KEY_ENV: &str = "DYNAMIS_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "DYNAMIS_SECRET_KEY";
pub const AWS_REGION_ENV: &str = "AWS_REGION";
pub const AWS_ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ACCESS_KEY: &str = "dynamis";
pub const DEFAULT_SECRET_KEY: &str = "dynamis";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub enum Endpoint {
    Memory(MemoryStore),
    Http(Url),
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    endpoint: Endpoint,
    region: String,
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    timeout: Duration,
}

impl StoreConfig {
    /// Config bound to an in-process store; clones of `store` share its tables.
    pub fn memory(store: MemoryStore) -> Self {
        Self::with_endpoint(Endpoint::Memory(store))
    }

    pub fn remote(endpoint: impl Into<String>) -> Result<Self, Error> {
        let url = normalize_endpoint(endpoint.into())?;
        Ok(Self::with_endpoint(Endpoint::Http(url)))
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves the config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = if let Some(endpoint) = value(ENDPOINT_ENV) {
            Self::remote(endpoint)?
        } else if let Some(hostport) = value(HOSTPORT_ENV) {
            Self::remote(format!("http://{hostport}"))?
        } else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("no store endpoint configured")
                .with_hint(format!(
                    "Set {ENDPOINT_ENV}=http://host:port or {HOSTPORT_ENV}=host:port."
                )));
        };
        if let Some(region) = value(REGION_ENV).or_else(|| value(AWS_REGION_ENV)) {
            config = config.with_region(region);
        }
        if let Some(access_key) = value(ACCESS_KEY_ENV).or_else(|| value(AWS_ACCESS_KEY_ENV)) {
            config = config.with_access_key(access_key);
        }
        if let Some(secret_key) = value(SECRET_KEY_ENV).or_else(|| value(AWS_SECRET_KEY_ENV)) {
            config.secret_key = secret_key;
        }
        if let Some(token) = value(AWS_SESSION_TOKEN_ENV) {
            config = config.with_session_token(token);
        }
        Ok(config)
    }

    fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            region: DEFAULT_REGION.to_string(),
            access_key: DEFAULT_ACCESS_KEY.to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            session_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Access key id that signs each request. Local store emulators partition
    /// their data by access key and region.
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = access_key.into();
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Session token for temporary credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn connect(&self) -> Result<Arc<dyn Store>, Error> {
        match &self.endpoint {
            Endpoint::Memory(store) => Ok(Arc::new(store.clone())),
            Endpoint::Http(_) => Ok(Arc::new(RemoteStore::new(self)?)),
        }
    }
}

fn normalize_endpoint(raw: String) -> Result<Url, Error> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid store endpoint: {raw}"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("store endpoint must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("store endpoint must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
