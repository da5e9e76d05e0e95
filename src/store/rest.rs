use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{GraphKbError, Result};
use crate::store::backend::{Backend, Params};

/// Backend speaking the store's HTTP command API.
///
/// Statements go to `POST {url}/command/{database}/sql` as
/// `{"command": ..., "parameters": ...}` with basic auth; result rows come
/// back under `"result"`.
pub struct RestBackend {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Vec<Value>,
}

impl RestBackend {
    pub fn new(config: &StoreConfig) -> Result<RestBackend> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.query_timeout_ms))
            .build()
            .map_err(|err| GraphKbError::Connection(err.to_string()))?;
        let endpoint = format!(
            "{}/command/{}/sql",
            config.url.trim_end_matches('/'),
            config.database
        );
        Ok(RestBackend {
            http,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_ms: config.query_timeout_ms,
        })
    }

    fn classify(status: reqwest::StatusCode, body: String) -> GraphKbError {
        match status.as_u16() {
            400 => GraphKbError::Validation(body),
            404 => GraphKbError::NotFound(body),
            409 => GraphKbError::Conflict(body),
            _ => GraphKbError::Internal(format!("store returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn command(&self, text: &str, params: &Params) -> Result<Vec<Value>> {
        debug!(target: "graphkb::store", command = text, "dispatching statement");
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "command": text, "parameters": params }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GraphKbError::Timeout(self.timeout_ms)
                } else {
                    GraphKbError::Connection(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        let parsed: CommandResponse = response
            .json()
            .await
            .map_err(|err| GraphKbError::Internal(format!("malformed store response: {err}")))?;
        Ok(parsed.result)
    }
}
