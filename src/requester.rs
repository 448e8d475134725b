//! Authenticated JSON client for the Rapida backend.
//!
//! The async logger and feedback both talk to Rapida over plain JSON
//! POST/PATCH with a bearer token; they differ only in the base URL and in
//! which header carries the token.

use crate::config::RapidaConfig;
use crate::error::RapidaError;
use crate::headers::{RAPIDA_AUTH, bearer};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

/// Header the bearer token is sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>` (log endpoints).
    #[default]
    Authorization,
    /// `Rapida-Auth: Bearer <key>` (proxy and feedback endpoints).
    RapidaAuth,
}

impl AuthScheme {
    fn header_name(&self) -> &'static str {
        match self {
            Self::Authorization => "Authorization",
            Self::RapidaAuth => RAPIDA_AUTH,
        }
    }
}

/// POST/PATCH client rooted at a base URL.
#[derive(Debug, Clone)]
pub struct Requester {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    auth: AuthScheme,
}

impl Requester {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(SecretString::from),
            auth: AuthScheme::default(),
        }
    }

    /// Requester against the configured logging backend.
    pub fn from_config(config: &RapidaConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_key().map(str::to_string))
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_auth_scheme(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, RapidaError> {
        self.send(Method::POST, self.url(path), body).await
    }

    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, RapidaError> {
        self.send(Method::PATCH, self.url(path), body).await
    }

    /// Send `body` as JSON to an absolute URL.
    ///
    /// Non-success statuses become [`RapidaError::ApiError`] carrying the
    /// response body. An empty success body decodes to `null`, a non-JSON one
    /// to a string.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        body: &T,
    ) -> Result<Value, RapidaError> {
        let mut request = self.client.request(method.clone(), &url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(self.auth.header_name(), bearer(key.expose_secret()));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                target: "rapida::requester",
                %method,
                %url,
                status = status.as_u16(),
                body = %text,
                "Rapida request failed"
            );
            return Err(RapidaError::ApiError {
                code: status.as_u16(),
                message: text.clone(),
                details: serde_json::from_str(&text).ok(),
            });
        }

        tracing::debug!(
            target: "rapida::requester",
            %method,
            %url,
            status = status.as_u16(),
            "Rapida request succeeded"
        );

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
