//! AstraDNS REST Client
//!
//! One authenticated HTTP call per `request`, JSON in and JSON out.
//! No retries and no client-side timeout: every call is a single attempt
//! bounded only by the transport defaults. Dropping the returned future
//! cancels the call.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::credential::Credential;
use crate::error::RequestError;

/// HTTP client bound to one backend
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::ClientConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an absolute API path (`/api/stats`) against the base URL
    pub fn url(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path)
            .map_err(|e| RequestError::network(format!("invalid path {}: {}", path, e)))
    }

    /// URL for one member of a collection, with the id percent-encoded
    pub fn member_url(&self, collection: &str, id: &str) -> Result<Url, RequestError> {
        let mut url = self.url(collection)?;
        url.path_segments_mut()
            .map_err(|_| RequestError::network(format!("cannot extend {}", collection)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Perform one request against `path`.
    ///
    /// A 2xx with an empty body yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        credential: &Credential,
    ) -> Result<Value, RequestError> {
        let url = self.url(path)?;
        self.send(method, url, body, credential).await
    }

    /// Like [`request`](Self::request) but decodes the response into `T`
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        credential: &Credential,
    ) -> Result<T, RequestError> {
        let value = self.request(method, path, body, credential).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        credential: &Credential,
    ) -> Result<Value, RequestError> {
        debug!("{} {}", method, url.path());

        let mut builder = self.client.request(method.clone(), url.clone());
        if !credential.is_empty() {
            builder = builder.header(AUTHORIZATION, credential.as_str());
        }
        if let Some(body) = body {
            let payload = serde_json::to_vec(body)?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::network(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            debug!("{} {} -> {}: {}", method, url.path(), status.as_u16(), message);
            return Err(RequestError::from_status(status.as_u16(), message));
        }

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| RequestError::malformed(format!("{} {}: {}", method, url.path(), e)))
    }
}

/// Serialize a request body, mapping failure onto the error taxonomy
pub fn to_body<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    Ok(serde_json::to_value(value)?)
}

/// Pull a human-readable message out of an error response.
///
/// The backend answers `{"error": "..."}`; anything else falls back to the
/// reason phrase.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}
