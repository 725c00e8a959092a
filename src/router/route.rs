//! Free-function helpers for composing listeners at registration time.

use std::sync::Arc;

use crate::config::ConfigError;
use crate::context::Context;
use crate::error::Error;
use crate::interceptors::{FieldFilter, FilterInterceptor, Interceptor};
use crate::listeners::{Deferred, FieldSwitch, Intercepted, Listener};

/// Wraps a listener so it runs after the ack, with an empty pre-ack.
pub fn deferred(listener: impl Listener + 'static) -> Deferred {
    Deferred::new(Arc::new(listener), None)
}

/// Wraps a listener with a single interceptor.
pub fn intercepted(
    interceptor: impl Interceptor + 'static,
    listener: impl Listener + 'static,
) -> Intercepted {
    Intercepted::new(Arc::new(interceptor), Arc::new(listener))
}

/// Runs the listener only when the payload fields match; a non-matching
/// payload falls through to the no-match listener.
pub fn filtered(
    fields: Vec<(&str, &str)>,
    listener: impl Listener + 'static,
) -> Result<Intercepted, ConfigError> {
    let filter = FilterInterceptor::new(FieldFilter::new(fields)?);
    Ok(Intercepted::new(Arc::new(filter), Arc::new(listener)))
}

/// Dispatches on the value of one payload field. Use `"*"` as the case
/// value for the default branch.
pub fn switch_on(field: &str, cases: Vec<(&str, Arc<dyn Listener>)>) -> FieldSwitch {
    FieldSwitch::new(field, cases)
}

/// Runs a side effect before the listener.
pub fn tapped<F>(callback: F, listener: impl Listener + 'static) -> Intercepted
where
    F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
{
    Intercepted::new(
        Arc::new(crate::interceptors::Tap::new(callback)),
        Arc::new(listener),
    )
}
