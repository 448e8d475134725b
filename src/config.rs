//! Process-wide configuration
//!
//! `RapidaConfig` carries the proxy/log endpoints and the API key. It is built
//! once, either explicitly through [`RapidaConfig::builder`] or from the
//! environment, and then installed with [`init`]. Interceptors read it through
//! [`global`] unless they are handed a config of their own.
//!
//! ```rust,no_run
//! use rapida::config::{self, RapidaConfig};
//!
//! let config = RapidaConfig::builder()
//!     .api_key("sk-rapida-...")
//!     .proxy_url("https://oai.rapida.ai/v1")
//!     .build();
//! config::init(config).expect("config installed once");
//! ```

use crate::correlation::EvictionPolicy;
use crate::error::RapidaError;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Default logging backend.
pub const DEFAULT_BASE_URL: &str = "https://api.rapida.ai";

pub const ENV_API_KEY: &str = "RAPIDA_API_KEY";
pub const ENV_BASE_URL: &str = "RAPIDA_BASE_URL";
pub const ENV_PROXY_URL: &str = "RAPIDA_PROXY_URL";
pub const ENV_API_TYPE: &str = "RAPIDA_API_TYPE";

static GLOBAL_CONFIG: OnceLock<Arc<RapidaConfig>> = OnceLock::new();

/// Flavour of the upstream provider API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiType {
    #[default]
    OpenAi,
    /// Azure deployments reject the `/v1` suffix on the proxy URL.
    Azure,
}

impl FromStr for ApiType {
    type Err = RapidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open_ai" | "openai" => Ok(Self::OpenAi),
            "azure" | "azure_ad" | "azuread" => Ok(Self::Azure),
            other => Err(RapidaError::ConfigurationError(format!(
                "Unknown API type '{other}'"
            ))),
        }
    }
}

/// How a call is pointed at the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointRouting {
    /// The target base URL is handed to the call; nothing shared is mutated.
    #[default]
    PerCall,
    /// The shared provider endpoint is swapped under a lock for the duration
    /// of the call. For call surfaces that only read shared configuration.
    Swap,
}

/// Configuration shared by interceptors, the logger and feedback.
#[derive(Debug, Clone)]
pub struct RapidaConfig {
    api_key: Option<SecretString>,
    /// Logging backend (`/oai/v1/log`, ...).
    pub base_url: String,
    /// Proxy that calls are routed through. `None` disables routing.
    pub proxy_url: Option<String>,
    pub api_type: ApiType,
    pub routing: EndpointRouting,
    /// Eviction strategy for the global correlation store.
    pub eviction: EvictionPolicy,
}

impl Default for RapidaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy_url: None,
            api_type: ApiType::default(),
            routing: EndpointRouting::default(),
            eviction: EvictionPolicy::default(),
        }
    }
}

impl RapidaConfig {
    pub fn builder() -> RapidaConfigBuilder {
        RapidaConfigBuilder::default()
    }

    /// Load configuration from `RAPIDA_*` environment variables.
    pub fn from_env() -> Result<Self, RapidaError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RapidaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self::builder();
        if let Some(key) = get(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            builder = builder.base_url(url);
        }
        if let Some(url) = get(ENV_PROXY_URL) {
            builder = builder.proxy_url(url);
        }
        if let Some(api_type) = get(ENV_API_TYPE) {
            builder = builder.api_type(api_type.parse()?);
        }
        builder.try_build()
    }

    /// The API key, if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret())
    }

    /// Proxy URL adjusted for the configured API type.
    ///
    /// Azure endpoints are addressed without the `/v1` suffix.
    pub fn effective_proxy_url(&self) -> Option<String> {
        let proxy = self.proxy_url.as_deref()?;
        if self.api_type == ApiType::Azure
            && let Some(stripped) = proxy.strip_suffix("/v1")
        {
            tracing::warn!(
                target: "rapida::config",
                proxy_url = %proxy,
                "likely invalid Azure API URL for proxying; removing '/v1' from the end"
            );
            return Some(stripped.to_string());
        }
        Some(proxy.to_string())
    }
}

/// Builder for [`RapidaConfig`].
#[derive(Debug, Clone, Default)]
pub struct RapidaConfigBuilder {
    api_key: Option<SecretString>,
    base_url: Option<String>,
    proxy_url: Option<String>,
    api_type: ApiType,
    routing: EndpointRouting,
    eviction: EvictionPolicy,
}

impl RapidaConfigBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn api_type(mut self, api_type: ApiType) -> Self {
        self.api_type = api_type;
        self
    }

    pub fn routing(mut self, routing: EndpointRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Build, validating the URLs.
    pub fn try_build(self) -> Result<RapidaConfig, RapidaError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        validate_url("base_url", &base_url)?;
        if let Some(proxy) = &self.proxy_url {
            validate_url("proxy_url", proxy)?;
        }

        Ok(RapidaConfig {
            api_key: self.api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            proxy_url: self.proxy_url.map(|p| p.trim_end_matches('/').to_string()),
            api_type: self.api_type,
            routing: self.routing,
            eviction: self.eviction,
        })
    }

    /// Build without validation. Invalid URLs surface on first use.
    pub fn build(self) -> RapidaConfig {
        RapidaConfig {
            api_key: self.api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            proxy_url: self.proxy_url,
            api_type: self.api_type,
            routing: self.routing,
            eviction: self.eviction,
        }
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), RapidaError> {
    let invalid = |reason: &str| {
        RapidaError::ConfigurationError(format!(
            "{field} must be an http(s) URL with a host, got '{url}': {reason}"
        ))
    };
    let parsed = reqwest::Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("unsupported scheme"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// Install the process-wide configuration. Fails if one is already installed.
pub fn init(config: RapidaConfig) -> Result<(), RapidaError> {
    GLOBAL_CONFIG
        .set(Arc::new(config))
        .map_err(|_| RapidaError::configuration("Rapida configuration is already initialized"))
}

/// The process-wide configuration.
///
/// Falls back to the environment (and then to defaults) when [`init`] was
/// never called.
pub fn global() -> Arc<RapidaConfig> {
    GLOBAL_CONFIG
        .get_or_init(|| {
            let config = RapidaConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!(
                    target: "rapida::config",
                    error = %e,
                    "ignoring invalid environment configuration"
                );
                RapidaConfig::default()
            });
            Arc::new(config)
        })
        .clone()
}
