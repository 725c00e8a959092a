//! Per-request dispatch context.
//!
//! A [`Context`] owns the inbound [`Payload`] plus all bookkeeping for one
//! request: a free-form key/value bag for inter-listener communication, the
//! one-shot `acknowledged` flag, the `deferred` flag, and the injected
//! outbound clients. A context is mutable only while its request is being
//! dispatched; for out-of-process deferral it round-trips through a flat
//! map (see [`Context::to_map`] / [`Context::from_map`]).

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::clients::{ApiClient, RespondClient};
use crate::error::Error;
use crate::payload::Payload;

/// Reserved keys used when flattening a context to a map.
const ACKNOWLEDGED_KEY: &str = "_acknowledged";
const APP_ID_KEY: &str = "_app";
const DEFERRED_KEY: &str = "_deferred";
const PAYLOAD_KEY: &str = "_payload";
const RESERVED_KEYS: [&str; 4] = [ACKNOWLEDGED_KEY, APP_ID_KEY, DEFERRED_KEY, PAYLOAD_KEY];

pub struct Context {
    payload: Payload,
    data: Map<String, Value>,
    acknowledged: bool,
    deferred: bool,
    app_id: Option<String>,
    ack_body: Option<Value>,
    api_client: Option<Arc<dyn ApiClient>>,
    respond_client: Option<Arc<dyn RespondClient>>,
}

impl Context {
    pub fn new(payload: Payload) -> Self {
        let app_id = payload.app_id().map(str::to_string);
        Context {
            payload,
            data: Map::new(),
            acknowledged: false,
            deferred: false,
            app_id,
            ack_body: None,
            api_client: None,
            respond_client: None,
        }
    }

    /// Reconstructs a context from its flattened form, typically after an
    /// out-of-process deferral hand-off. The reserved keys restore the
    /// payload and both phase flags; everything else lands back in the
    /// data bag.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let payload = Payload::new(map.remove(PAYLOAD_KEY).unwrap_or(Value::Null));
        let acknowledged = map
            .remove(ACKNOWLEDGED_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let deferred = map
            .remove(DEFERRED_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let app_id = map
            .remove(APP_ID_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| payload.app_id().map(str::to_string));

        Context {
            payload,
            data: map,
            acknowledged,
            deferred,
            app_id,
            ack_body: None,
            api_client: None,
            respond_client: None,
        }
    }

    /// Flattens the context to a map that [`Context::from_map`] can
    /// reconstruct an equivalent context from. Injected clients are not
    /// part of the serialized form.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.data.clone();
        map.insert(PAYLOAD_KEY.to_string(), self.payload.as_value().clone());
        map.insert(ACKNOWLEDGED_KEY.to_string(), Value::Bool(self.acknowledged));
        map.insert(DEFERRED_KEY.to_string(), Value::Bool(self.deferred));
        map.insert(
            APP_ID_KEY.to_string(),
            self.app_id.as_deref().map(Value::from).unwrap_or(Value::Null),
        );
        map
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.app_id = Some(app_id.into());
    }

    /// Sets a value in the context data for other listeners/interceptors.
    /// The internal bookkeeping keys are off limits.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), Error> {
        if RESERVED_KEYS.contains(&key) {
            return Err(Error::ReservedKey(key.to_string()));
        }
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// The body captured by `ack`, if any.
    pub fn ack_body(&self) -> Option<&Value> {
        self.ack_body.as_ref()
    }

    /// Commits the reply for this request. Acks generally have an empty
    /// body, but some payload types (commands, block suggestions) may
    /// carry data in the ack.
    ///
    /// Acking twice is a programming error and fails with
    /// [`Error::AlreadyAcknowledged`].
    pub fn ack(&mut self, body: Option<Value>) -> Result<(), Error> {
        if self.acknowledged {
            return Err(Error::AlreadyAcknowledged);
        }

        if body.is_some() {
            debug!(target: "dispatch", "acknowledging with a non-empty body");
        }

        self.acknowledged = true;
        self.ack_body = body;
        Ok(())
    }

    /// Acks with a plain-text message body.
    pub fn ack_text(&mut self, text: &str) -> Result<(), Error> {
        self.ack(Some(json!({ "text": text })))
    }

    /// Marks this request as needing more processing after the ack. The
    /// configured deferrer picks the context up once the pre-ack phase
    /// completes.
    pub fn defer(&mut self) {
        self.deferred = true;
    }

    pub fn with_api_client(&mut self, client: Arc<dyn ApiClient>) -> &mut Self {
        self.api_client = Some(client);
        self
    }

    pub fn with_respond_client(&mut self, client: Arc<dyn RespondClient>) -> &mut Self {
        self.respond_client = Some(client);
        self
    }

    pub fn has_api_client(&self) -> bool {
        self.api_client.is_some()
    }

    pub fn has_respond_client(&self) -> bool {
        self.respond_client.is_some()
    }

    /// Calls a platform Web API method (e.g. `chat.postMessage`) through
    /// the injected client.
    pub fn api(&self, method: &str, params: Value) -> Result<Value, Error> {
        let client = self.api_client.as_ref().ok_or(Error::NoApiClient)?;
        Ok(client.call(method, params)?)
    }

    /// Sends a follow-up message to the payload's response URL (or an
    /// explicitly provided one).
    pub fn respond(&self, message: &Value, url: Option<&str>) -> Result<(), Error> {
        let url = match url.or_else(|| self.payload.response_url()) {
            Some(url) => url,
            None => return Err(Error::MissingResponseUrl),
        };
        let client = self.respond_client.as_ref().ok_or(Error::NoRespondClient)?;
        Ok(client.respond(url, message)?)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("payload_type", &self.payload.kind())
            .field("acknowledged", &self.acknowledged)
            .field("deferred", &self.deferred)
            .field("app_id", &self.app_id)
            .field("data_keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}
