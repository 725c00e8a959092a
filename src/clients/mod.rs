//! Outbound API clients.
//!
//! Listeners perform side effects through two seams: the Web API client
//! (`ApiClient`, method calls like `chat.postMessage`) and the respond
//! client (`RespondClient`, follow-up messages POSTed to a payload's
//! response URL). Dispatch is synchronous per request, so the default
//! implementations use `reqwest::blocking`.

use serde_json::Value;
use thiserror::Error;

/// Default Web API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api call `{method}` failed: {error}")]
    Api { method: String, error: String },
}

/// Calls platform Web API methods on behalf of listeners.
pub trait ApiClient: Send + Sync {
    fn call(&self, method: &str, params: Value) -> Result<Value, ApiError>;
}

/// Sends a message to a response URL.
pub trait RespondClient: Send + Sync {
    fn respond(&self, url: &str, message: &Value) -> Result<(), ApiError>;
}

/// Token-authenticated JSON client for the Web API.
pub struct HttpApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl HttpApiClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ApiError> {
        Ok(HttpApiClient {
            http: reqwest::blocking::Client::builder().build()?,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: token.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ApiClient for HttpApiClient {
    fn call(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), method);
        let result: Value = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&params)
            .send()?
            .error_for_status()?
            .json()?;

        // The Web API reports failures in-band with `ok: false`.
        if result.get("ok").and_then(Value::as_bool) == Some(false) {
            let error = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(ApiError::Api { method: method.to_string(), error });
        }

        Ok(result)
    }
}

/// POSTs messages to response URLs.
pub struct HttpRespondClient {
    http: reqwest::blocking::Client,
}

impl HttpRespondClient {
    pub fn new() -> Result<Self, ApiError> {
        Ok(HttpRespondClient { http: reqwest::blocking::Client::builder().build()? })
    }
}

impl RespondClient for HttpRespondClient {
    fn respond(&self, url: &str, message: &Value) -> Result<(), ApiError> {
        self.http.post(url).json(message).send()?.error_for_status()?;
        Ok(())
    }
}
