//! Interceptors: composable middleware around listeners.
//!
//! An [`Interceptor`] observes or transforms a [`Context`] before
//! delegating to the next listener, and may short-circuit by not
//! delegating at all. A [`Chain`] composes interceptors onion-style: the
//! first interceptor added wraps outermost, so it runs first on the way in
//! and last on the way out.

use std::sync::Arc;

use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ConfigError;
use crate::context::Context;
use crate::error::Error;
use crate::listeners::{Listener, Undefined};
use crate::payload::PayloadType;

pub trait Interceptor: Send + Sync {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error>;
}

impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error> {
        (**self).intercept(cx, next)
    }
}

/// Ordered sequence of interceptors composed by fold-right at dispatch
/// time: the interceptor at index 0 is outermost.
#[derive(Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor. No dedup is performed: adding the same
    /// instance twice runs it twice.
    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Prepends an interceptor, making it the new outermost layer.
    pub fn prepend(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.insert(0, interceptor);
        self
    }

    /// Splices another chain's elements in at the end (or the front),
    /// preserving their relative order. Chains compose flat: the spliced
    /// elements become ordinary members rather than an opaque nested unit.
    pub fn splice(&mut self, other: Chain, prepend: bool) -> &mut Self {
        if prepend {
            self.interceptors.splice(0..0, other.interceptors);
        } else {
            self.interceptors.extend(other.interceptors);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }
}

/// Walks the remaining interceptors; when none are left, the terminal
/// listener runs.
struct Cursor<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Listener,
}

impl Listener for Cursor<'_> {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                head.intercept(cx, &Cursor { rest: tail, terminal: self.terminal })
            }
            None => self.terminal.handle(cx),
        }
    }
}

impl Interceptor for Chain {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error> {
        Cursor { rest: &self.interceptors, terminal: next }.handle(cx)
    }
}

/// Runs a side-effect callback with the context, then delegates.
pub struct Tap {
    callback: Box<dyn Fn(&mut Context) -> Result<(), Error> + Send + Sync>,
}

impl Tap {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        Tap { callback: Box::new(callback) }
    }
}

impl Interceptor for Tap {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error> {
        (self.callback)(cx)?;
        next.handle(cx)
    }
}

/// Predicate deciding whether the wrapped listener should see a context.
pub trait Filter: Send + Sync {
    fn matches(&self, cx: &mut Context) -> Result<bool, Error>;
}

/// Forwards to the next listener only when the filter matches; otherwise
/// a fallback listener (default: [`Undefined`]) runs instead.
pub struct FilterInterceptor {
    filter: Box<dyn Filter>,
    fallback: Arc<dyn Listener>,
}

impl FilterInterceptor {
    pub fn new(filter: impl Filter + 'static) -> Self {
        FilterInterceptor { filter: Box::new(filter), fallback: Arc::new(Undefined) }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn Listener>) -> Self {
        self.fallback = fallback;
        self
    }
}

impl Interceptor for FilterInterceptor {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error> {
        if self.filter.matches(cx)? {
            next.handle(cx)
        } else {
            debug!(target: "dispatch", "filter did not match; running fallback listener");
            self.fallback.handle(cx)
        }
    }
}

/// Filter backed by a plain predicate function.
pub struct CallbackFilter {
    predicate: Box<dyn Fn(&Context) -> bool + Send + Sync>,
}

impl CallbackFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        CallbackFilter { predicate: Box::new(predicate) }
    }
}

impl Filter for CallbackFilter {
    fn matches(&self, cx: &mut Context) -> Result<bool, Error> {
        Ok((self.predicate)(cx))
    }
}

enum FieldMatch {
    /// Exact value comparison; `negate` for `not:`-prefixed values.
    Eq { value: String, negate: bool },
    /// `regex:`-prefixed values; capture groups are stored in the context
    /// under the `regex` key, indexed by field.
    Regex(Regex),
}

/// Matches payload fields against declared values. Value syntax:
/// `"value"`, `"not:value"`, or `"regex:<pattern>"`.
pub struct FieldFilter {
    fields: Vec<(String, FieldMatch)>,
}

impl FieldFilter {
    pub fn new(fields: Vec<(&str, &str)>) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            let matcher = if let Some(pattern) = value.strip_prefix("regex:") {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                FieldMatch::Regex(regex)
            } else if let Some(value) = value.strip_prefix("not:") {
                FieldMatch::Eq { value: value.to_string(), negate: true }
            } else {
                FieldMatch::Eq { value: value.to_string(), negate: false }
            };
            compiled.push((field.to_string(), matcher));
        }
        Ok(FieldFilter { fields: compiled })
    }
}

impl Filter for FieldFilter {
    fn matches(&self, cx: &mut Context) -> Result<bool, Error> {
        for (field, matcher) in &self.fields {
            let actual = cx.payload().get_str(field).map(str::to_string);
            match matcher {
                FieldMatch::Eq { value, negate } => {
                    let equal = actual.as_deref() == Some(value.as_str());
                    if equal == *negate {
                        return Ok(false);
                    }
                }
                FieldMatch::Regex(regex) => {
                    let Some(actual) = actual else { return Ok(false) };
                    let Some(captures) = regex.captures(&actual) else { return Ok(false) };
                    let groups: Vec<Value> = captures
                        .iter()
                        .map(|c| match c {
                            Some(m) => Value::String(m.as_str().to_string()),
                            None => Value::Null,
                        })
                        .collect();
                    let mut all = cx.remove("regex").unwrap_or_else(|| json!({}));
                    if let Some(map) = all.as_object_mut() {
                        map.insert(field.clone(), Value::Array(groups));
                    }
                    cx.set("regex", all)?;
                }
            }
        }
        Ok(true)
    }
}

/// Answers `url_verification` handshakes with the challenge value and
/// short-circuits the rest of the chain. Must be the outermost interceptor
/// so no routing logic sees these requests.
pub struct UrlVerification;

impl Interceptor for UrlVerification {
    fn intercept(&self, cx: &mut Context, next: &dyn Listener) -> Result<(), Error> {
        if cx.payload().is_type(PayloadType::UrlVerification) {
            let challenge = cx
                .payload()
                .get_str("challenge")
                .map(str::to_string)
                .ok_or(Error::MissingChallenge)?;
            cx.ack(Some(json!({ "challenge": challenge })))
        } else {
            next.handle(cx)
        }
    }
}
