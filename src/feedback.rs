//! Feedback
//!
//! Attach a named rating or score to a completed call, identified by the
//! `rapida.id` the correlator put on its result.

use crate::config::{self, RapidaConfig};
use crate::correlation::RAPIDA_FIELD;
use crate::error::RapidaError;
use crate::requester::{AuthScheme, Requester};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of value a feedback entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Boolean,
    Numerical,
    Categorical,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical names plus common aliases, case-insensitively.
impl FromStr for DataType {
    type Err = RapidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Boolean),
            "float" | "int" | "numerical" => Ok(Self::Numerical),
            "object" | "categorical" => Ok(Self::Categorical),
            _ => Err(RapidaError::validation(format!(
                "Invalid data type '{s}'; expected string, boolean, numerical or categorical"
            ))),
        }
    }
}

/// Submits feedback to the proxy's `/feedback` endpoint.
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    requester: Requester,
}

impl FeedbackClient {
    /// Client posting to `{proxy_url}/feedback`.
    pub fn new(proxy_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_requester(Requester::new(proxy_url, api_key))
    }

    /// Use a prepared requester. It is switched to `Rapida-Auth`.
    pub fn with_requester(requester: Requester) -> Self {
        Self {
            requester: requester.with_auth_scheme(AuthScheme::RapidaAuth),
        }
    }

    /// Client for the configured proxy. Fails when no proxy URL is set.
    pub fn from_config(config: &RapidaConfig) -> Result<Self, RapidaError> {
        let proxy_url = config.proxy_url.clone().ok_or_else(|| {
            RapidaError::configuration("Feedback requires a proxy URL; none is configured")
        })?;
        Ok(Self::new(proxy_url, config.api_key().map(str::to_string)))
    }

    pub fn from_global() -> Result<Self, RapidaError> {
        Self::from_config(&config::global())
    }

    /// Record feedback `name = value` for the call that produced `response`.
    ///
    /// `response` must carry a non-empty `rapida.id`, and `data_type`, when
    /// given, must name a known type; both are checked before any request is
    /// sent.
    pub async fn log_feedback(
        &self,
        response: &Value,
        name: &str,
        value: impl Into<Value>,
        data_type: Option<&str>,
    ) -> Result<Value, RapidaError> {
        let rapida_id = response_id(response)?;
        let data_type = data_type.map(str::parse::<DataType>).transpose()?;

        let mut body = Map::new();
        body.insert("rapida-id".into(), Value::String(rapida_id.to_string()));
        body.insert("name".into(), Value::String(name.to_string()));
        body.insert("value".into(), value.into());
        if let Some(data_type) = data_type {
            body.insert("data-type".into(), Value::String(data_type.as_str().into()));
        }

        tracing::debug!(target: "rapida::feedback", rapida_id, name, "submitting feedback");
        self.requester.post("/feedback", &body).await
    }
}

fn response_id(response: &Value) -> Result<&str, RapidaError> {
    response
        .get(RAPIDA_FIELD)
        .and_then(|rapida| rapida.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            RapidaError::validation("The provided response does not have a valid Rapida ID.")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn data_type_aliases() {
        let cases = [
            ("str", DataType::String),
            ("String", DataType::String),
            ("BOOL", DataType::Boolean),
            ("boolean", DataType::Boolean),
            ("int", DataType::Numerical),
            ("float", DataType::Numerical),
            ("numerical", DataType::Numerical),
            ("object", DataType::Categorical),
            ("categorical", DataType::Categorical),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<DataType>().unwrap(), expected, "{input}");
        }
        assert!("date".parse::<DataType>().unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn int_is_submitted_as_numerical() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/feedback")
            .match_header("rapida-auth", "Bearer rk-fb")
            .match_body(Matcher::Json(json!({
                "rapida-id": "resp-1",
                "name": "score",
                "value": 4,
                "data-type": "numerical"
            })))
            .with_status(200)
            .with_body(r#"{"id":"fb-1"}"#)
            .create_async()
            .await;

        let client = FeedbackClient::new(format!("{}/v1", server.url()), Some("rk-fb".into()));
        let response = json!({"id": "chatcmpl-1", "rapida": {"id": "resp-1"}});
        let body = client
            .log_feedback(&response, "score", 4, Some("int"))
            .await
            .unwrap();

        assert_eq!(body["id"], "fb-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn data_type_is_optional() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/feedback")
            .match_body(Matcher::Json(json!({
                "rapida-id": "resp-2",
                "name": "liked",
                "value": true
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = FeedbackClient::new(server.url(), None);
        client
            .log_feedback(&json!({"rapida": {"id": "resp-2"}}), "liked", true, None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_id_fails_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;
        let client = FeedbackClient::new(server.url(), None);

        for response in [
            json!({"id": "chatcmpl-1"}),
            json!({"rapida": {"id": null}}),
            json!({"rapida": {"id": ""}}),
        ] {
            let err = client
                .log_feedback(&response, "score", 1, None)
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bad_data_type_fails_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;
        let client = FeedbackClient::new(server.url(), None);

        let err = client
            .log_feedback(&json!({"rapida": {"id": "r"}}), "score", 1, Some("date"))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/feedback")
            .with_status(422)
            .with_body("unknown rapida-id")
            .create_async()
            .await;

        let client = FeedbackClient::new(server.url(), None);
        let err = client
            .log_feedback(&json!({"rapida": {"id": "r"}}), "score", 1, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RapidaError::ApiError {
                code: 422,
                message: "unknown rapida-id".into(),
                details: None,
            }
        );
    }

    #[test]
    fn from_config_requires_proxy() {
        let err = FeedbackClient::from_config(&RapidaConfig::default()).unwrap_err();
        assert!(matches!(err, RapidaError::ConfigurationError(_)));
    }
}
