//! Listeners: the units of behavior a payload is routed to.
//!
//! A [`Listener`] consumes a [`Context`] and usually acknowledges it (or
//! defers it). The variants here form a closed set replacing the loose
//! string/callable coercion of duck-typed frameworks: callbacks, static
//! acks, two-phase wrappers, field switches, interceptor-wrapped listeners,
//! and registry-resolved named listeners.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ConfigError;
use crate::context::Context;
use crate::error::Error;
use crate::interceptors::Interceptor;

pub trait Listener: Send + Sync {
    fn handle(&self, cx: &mut Context) -> Result<(), Error>;
}

impl<L: Listener + ?Sized> Listener for Arc<L> {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        (**self).handle(cx)
    }
}

/// Listener with its logic provided as a closure.
pub struct Callback {
    callback: Box<dyn Fn(&mut Context) -> Result<(), Error> + Send + Sync>,
}

impl Callback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        Callback { callback: Box::new(callback) }
    }
}

impl Listener for Callback {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        (self.callback)(cx)
    }
}

/// Listener that merely acks, optionally with a message body. Useful as a
/// pre-ack placeholder for deferred commands ("processing...").
pub struct Ack {
    body: Option<Value>,
}

impl Ack {
    pub fn empty() -> Self {
        Ack { body: None }
    }

    pub fn with(body: Value) -> Self {
        Ack { body: Some(body) }
    }

    pub fn text(text: &str) -> Self {
        Ack::with(serde_json::json!({ "text": text }))
    }
}

impl Listener for Ack {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        cx.ack(self.body.clone())
    }
}

/// Two-phase wrapper for work that cannot finish inside the reply budget.
///
/// Pre-ack (context not yet acknowledged): runs the sync listener
/// (defaulting to an empty [`Ack`]) and marks the context deferred.
/// Post-ack (context re-entered with `acknowledged == true`): runs the
/// primary listener, which must not ack again.
pub struct Deferred {
    primary: Arc<dyn Listener>,
    pre_ack: Arc<dyn Listener>,
}

impl Deferred {
    pub fn new(primary: Arc<dyn Listener>, pre_ack: Option<Arc<dyn Listener>>) -> Self {
        Deferred {
            primary,
            pre_ack: pre_ack.unwrap_or_else(|| Arc::new(Ack::empty())),
        }
    }
}

impl Listener for Deferred {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        if cx.is_acknowledged() {
            self.primary.handle(cx)
        } else {
            self.pre_ack.handle(cx)?;
            cx.defer();
            Ok(())
        }
    }
}

/// Switches between listeners on the value of a payload field. A `*` case
/// acts as the default; with no match and no default, [`Undefined`] runs.
pub struct FieldSwitch {
    field: String,
    cases: HashMap<String, Arc<dyn Listener>>,
    default: Option<Arc<dyn Listener>>,
}

impl FieldSwitch {
    pub fn new(field: impl Into<String>, cases: Vec<(&str, Arc<dyn Listener>)>) -> Self {
        let mut default = None;
        let mut map = HashMap::new();
        for (value, listener) in cases {
            if value == "*" {
                default = Some(listener);
            } else {
                map.insert(value.to_string(), listener);
            }
        }
        FieldSwitch { field: field.into(), cases: map, default }
    }
}

impl Listener for FieldSwitch {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        let value = cx.payload().get_str(&self.field).map(str::to_string);
        let listener = value
            .as_deref()
            .and_then(|v| self.cases.get(v))
            .or(self.default.as_ref());
        match listener {
            Some(listener) => listener.handle(cx),
            None => Undefined.handle(cx),
        }
    }
}

/// Listener wrapped by an interceptor.
pub struct Intercepted {
    interceptor: Arc<dyn Interceptor>,
    listener: Arc<dyn Listener>,
}

impl Intercepted {
    pub fn new(interceptor: Arc<dyn Interceptor>, listener: Arc<dyn Listener>) -> Self {
        Intercepted { interceptor, listener }
    }
}

impl Listener for Intercepted {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        self.interceptor.intercept(cx, &self.listener)
    }
}

/// Built-in "no match" listener: logs and does nothing else. A routing
/// miss is not an error.
pub struct Undefined;

impl Listener for Undefined {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        error!(
            target: "dispatch",
            payload_type = %cx.payload().kind(),
            "no listener matching payload"
        );
        Ok(())
    }
}

/// Name-to-listener registry: the capability-injection seam for resolving
/// listeners registered by name. Resolution happens at configuration time,
/// not during dispatch.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: RwLock<HashMap<String, Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, listener: Arc<dyn Listener>) {
        let name = name.into();
        debug!(target: "dispatch", name = %name, "registered named listener");
        self.entries.write().insert(name, listener);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Listener>, ConfigError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownListener(name.to_string()))
    }
}
