//! HTTP backend over the servers' REST API.
//!
//! Every request carries the `X-Api-Key` header. Error statuses are read
//! rather than turned into bare status codes, so the backend's validation
//! messages reach the caller.

use crate::backend::{Backend, require};
use crate::error::{Error, Result};
use crate::types::{Dialect, ResourceKind, SchemaShape, SystemStatus, Tag};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use ureq::http::Response;

/// Per-request timeout.
const TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP backend.
///
/// # Example
///
/// ```no_run
/// use arrclient::backend::Backend;
/// use arrclient::backend::http::HttpBackend;
/// use arrclient::{Dialect, ResourceKind};
///
/// let backend = HttpBackend::new(Dialect::Sonarr, "http://localhost:8989", "secret");
/// let clients = backend.list(ResourceKind::DownloadClient).unwrap();
/// println!("Found {} download clients", clients.len());
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    dialect: Dialect,
    /// `<base_url>/api/<version>`
    api_base: String,
    api_key: String,
}

impl HttpBackend {
    /// Create a new HTTP backend.
    #[must_use]
    pub fn new(dialect: Dialect, base_url: &str, api_key: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            dialect,
            api_base: format!(
                "{}/api/{}",
                base_url.trim_end_matches('/'),
                dialect.api_version()
            ),
            api_key: api_key.into(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        log::trace!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .call()?;
        read(response)
    }

    fn send<T: DeserializeOwned>(&self, method: &str, path: &str, payload: &Value) -> Result<T> {
        let url = self.url(path);
        log::trace!("{method} {url}");
        let request = match method {
            "POST" => self.agent.post(&url),
            _ => self.agent.put(&url),
        };
        let response = request
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send_json(payload)?;
        read(response)
    }
}

/// Turn error statuses into [`Error::Api`]
fn check(mut response: Response<ureq::Body>) -> Result<Response<ureq::Body>> {
    let status = response.status().as_u16();
    if status >= 400 {
        let text = response.body_mut().read_to_string().unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        return Err(Error::api(status, body));
    }
    Ok(response)
}

fn read<T: DeserializeOwned>(response: Response<ureq::Body>) -> Result<T> {
    Ok(check(response)?.body_mut().read_json()?)
}

impl Backend for HttpBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        require(self.dialect, kind)?;
        self.get(kind.endpoint())
    }

    fn schema(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        require(self.dialect, kind)?;
        let path = format!("{}/schema", kind.endpoint());
        match kind.schema_shape() {
            SchemaShape::None => Ok(Vec::new()),
            SchemaShape::Providers => self.get(&path),
            SchemaShape::Single => Ok(vec![self.get(&path)?]),
        }
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Value> {
        require(self.dialect, kind)?;
        self.send("POST", kind.endpoint(), payload)
    }

    fn update(&self, kind: ResourceKind, id: i64, payload: &Value) -> Result<Value> {
        require(self.dialect, kind)?;
        self.send("PUT", &format!("{}/{id}", kind.endpoint()), payload)
    }

    fn delete(&self, kind: ResourceKind, id: i64) -> Result<()> {
        require(self.dialect, kind)?;
        let url = self.url(&format!("{}/{id}", kind.endpoint()));
        log::trace!("DELETE {url}");
        let response = self
            .agent
            .delete(&url)
            .header("X-Api-Key", &self.api_key)
            .call()?;
        check(response)?;
        Ok(())
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        self.get("tag")
    }

    fn create_tag(&self, label: &str) -> Result<Tag> {
        self.send("POST", "tag", &json!({ "label": label }))
    }

    fn system_status(&self) -> Result<SystemStatus> {
        self.get("system/status")
    }
}
