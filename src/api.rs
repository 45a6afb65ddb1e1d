//! Authenticated API handle
//!
//! A `RestClient` paired with the session's credential. Controllers hold one
//! of these instead of the credential itself; the session owns the original.

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::credential::Credential;
use crate::error::RequestError;
use crate::rest::{to_body, RestClient};

#[derive(Clone)]
pub struct Api {
    rest: RestClient,
    credential: Credential,
}

impl Api {
    pub fn new(rest: RestClient, credential: Credential) -> Self {
        Self { rest, credential }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        self.rest
            .request_json(Method::GET, path, None, &self.credential)
            .await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, RequestError> {
        let body = to_body(body)?;
        self.rest
            .request(Method::POST, path, Some(&body), &self.credential)
            .await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, RequestError> {
        let body = to_body(body)?;
        self.rest
            .request(Method::PUT, path, Some(&body), &self.credential)
            .await
    }

    pub async fn delete_url(&self, url: Url) -> Result<Value, RequestError> {
        self.rest
            .send(Method::DELETE, url, None, &self.credential)
            .await
    }
}
