//! Payload routing.
//!
//! The [`Router`] indexes listeners by `(payload type, identifier)` and
//! resolves inbound contexts to the most specific match, falling back to a
//! per-type default, then a global default, then the built-in no-match
//! listener. The router also owns an interceptor [`Chain`] that wraps
//! every resolved listener.

pub mod route;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::interceptors::{Chain, Interceptor, UrlVerification};
use crate::listeners::{Ack, Deferred, Listener, Undefined};
use crate::payload::PayloadType;

/// Identifier under which per-type and global defaults are registered.
const DEFAULT_ROUTE: &str = "_default";

/// Routing key: payload type (or the any-type default) plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    kind: Option<PayloadType>,
    id: String,
}

pub struct Router {
    listeners: HashMap<RouteKey, Arc<dyn Listener>>,
    interceptors: Chain,
    command_ack: Option<Arc<dyn Listener>>,
    url_verification_added: bool,
    undefined: Arc<dyn Listener>,
}

impl Default for Router {
    fn default() -> Self {
        Router {
            listeners: HashMap::new(),
            interceptors: Chain::new(),
            command_ack: None,
            url_verification_added: false,
            undefined: Arc::new(Undefined),
        }
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pre-ack message used by deferred commands to tell the user
    /// to wait for the result (e.g. "processing...").
    pub fn with_command_ack(mut self, body: Value) -> Self {
        self.command_ack = Some(Arc::new(Ack::with(body)));
        self
    }

    /// Enables answering `url_verification` handshakes. The interceptor is
    /// prepended so it short-circuits before any routing logic, and only
    /// once no matter how often this is called.
    pub fn with_url_verification(mut self) -> Self {
        if !self.url_verification_added {
            self.interceptors.prepend(Arc::new(UrlVerification));
            self.url_verification_added = true;
        }
        self
    }

    /// Registers a listener for a slash command.
    pub fn command(self, name: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::Command), name, Arc::new(listener))
    }

    /// Registers a command listener that defers its real work until after
    /// the ack; the configured command ack (or an empty one) is sent first.
    pub fn command_deferred(self, name: &str, listener: impl Listener + 'static) -> Self {
        let pre_ack = self.command_ack.clone();
        self.register(
            Some(PayloadType::Command),
            name,
            Arc::new(Deferred::new(Arc::new(listener), pre_ack)),
        )
    }

    /// Registers a sub-command router for a slash command.
    pub fn command_group(self, name: &str, group: crate::commands::CommandRouter) -> Self {
        self.register(Some(PayloadType::Command), name, Arc::new(group))
    }

    /// Deferred variant of [`Router::command_group`].
    pub fn command_group_deferred(self, name: &str, group: crate::commands::CommandRouter) -> Self {
        let pre_ack = self.command_ack.clone();
        self.register(
            Some(PayloadType::Command),
            name,
            Arc::new(Deferred::new(Arc::new(group), pre_ack)),
        )
    }

    /// Registers a listener for an event callback, keyed by event type.
    /// Implies URL verification handling.
    pub fn event(self, name: &str, listener: impl Listener + 'static) -> Self {
        self.with_url_verification()
            .register(Some(PayloadType::EventCallback), name, Arc::new(listener))
    }

    pub fn event_deferred(self, name: &str, listener: impl Listener + 'static) -> Self {
        self.with_url_verification().register(
            Some(PayloadType::EventCallback),
            name,
            Arc::new(Deferred::new(Arc::new(listener), None)),
        )
    }

    /// Registers a listener for a global shortcut, keyed by callback id.
    pub fn global_shortcut(self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::Shortcut), callback_id, Arc::new(listener))
    }

    /// Registers a listener for a message shortcut, keyed by callback id.
    pub fn message_shortcut(self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::MessageAction), callback_id, Arc::new(listener))
    }

    /// Registers a listener for a block action, keyed by action id.
    pub fn block_action(self, action_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::BlockActions), action_id, Arc::new(listener))
    }

    pub fn block_action_deferred(self, action_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(
            Some(PayloadType::BlockActions),
            action_id,
            Arc::new(Deferred::new(Arc::new(listener), None)),
        )
    }

    /// Registers a listener for a block suggestion, keyed by action id.
    pub fn block_suggestion(self, action_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::BlockSuggestion), action_id, Arc::new(listener))
    }

    /// Registers a listener for a view submission, keyed by callback id.
    pub fn view_submission(self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::ViewSubmission), callback_id, Arc::new(listener))
    }

    pub fn view_submission_deferred(
        self,
        callback_id: &str,
        listener: impl Listener + 'static,
    ) -> Self {
        self.register(
            Some(PayloadType::ViewSubmission),
            callback_id,
            Arc::new(Deferred::new(Arc::new(listener), None)),
        )
    }

    /// Registers a listener for a closed view, keyed by callback id.
    pub fn view_closed(self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::ViewClosed), callback_id, Arc::new(listener))
    }

    /// Registers a listener for a workflow step edit, keyed by callback id.
    pub fn workflow_step_edit(self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.register(Some(PayloadType::WorkflowStepEdit), callback_id, Arc::new(listener))
    }

    /// Registers a catch-all listener for one payload type.
    pub fn on(self, kind: PayloadType, listener: impl Listener + 'static) -> Self {
        self.register(Some(kind), DEFAULT_ROUTE, Arc::new(listener))
    }

    pub fn on_deferred(self, kind: PayloadType, listener: impl Listener + 'static) -> Self {
        self.register(
            Some(kind),
            DEFAULT_ROUTE,
            Arc::new(Deferred::new(Arc::new(listener), None)),
        )
    }

    /// Registers the global catch-all listener.
    pub fn any(self, listener: impl Listener + 'static) -> Self {
        self.register(None, DEFAULT_ROUTE, Arc::new(listener))
    }

    /// Adds a tap interceptor applying to all routed listeners.
    pub fn tap<F>(self, callback: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.use_interceptor(crate::interceptors::Tap::new(callback))
    }

    /// Appends an interceptor applying to all routed listeners.
    pub fn use_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.add(Arc::new(interceptor));
        self
    }

    /// Splices another interceptor chain into this router's chain.
    pub fn use_chain(mut self, chain: Chain) -> Self {
        self.interceptors.splice(chain, false);
        self
    }

    /// Stores a listener at a route key. Identifiers are trimmed of
    /// slashes and whitespace; re-registering a key is last-write-wins.
    fn register(mut self, kind: Option<PayloadType>, id: &str, listener: Arc<dyn Listener>) -> Self {
        let id = id.trim_matches(|c| c == '/' || c == ' ').to_string();
        debug!(
            target: "dispatch",
            payload_type = kind.map(|k| k.as_str()).unwrap_or(DEFAULT_ROUTE),
            id = %id,
            "registered listener"
        );
        self.listeners.insert(RouteKey { kind, id }, listener);
        self
    }

    /// Resolves the most specific registered listener for a payload:
    /// `(type, id)`, then `(type, default)`, then the global default, and
    /// finally the built-in no-match listener.
    pub fn resolve(&self, kind: PayloadType, id: Option<&str>) -> Arc<dyn Listener> {
        let id = id.unwrap_or(DEFAULT_ROUTE);
        let lookups = [
            RouteKey { kind: Some(kind), id: id.to_string() },
            RouteKey { kind: Some(kind), id: DEFAULT_ROUTE.to_string() },
            RouteKey { kind: None, id: DEFAULT_ROUTE.to_string() },
        ];
        for key in &lookups {
            if let Some(listener) = self.listeners.get(key) {
                return Arc::clone(listener);
            }
        }
        Arc::clone(&self.undefined)
    }
}

impl Listener for Router {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        let kind = cx.payload().kind();
        let id = cx.payload().type_id();
        let listener = self.resolve(kind, id.as_deref());
        self.interceptors.intercept(cx, &listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::Callback;
    use crate::payload::Payload;
    use serde_json::json;

    fn tag(name: &'static str) -> Callback {
        Callback::new(move |cx| cx.set("handled_by", json!(name)))
    }

    fn dispatch(router: &Router, data: Value) -> Context {
        let mut cx = Context::new(Payload::new(data));
        router.handle(&mut cx).unwrap();
        cx
    }

    #[test]
    fn test_fallback_order() {
        let router = Router::new()
            .command("x", tag("specific"))
            .on(PayloadType::Command, tag("type_default"))
            .any(tag("global_default"));

        let cx = dispatch(&router, json!({"command": "/x", "text": ""}));
        assert_eq!(cx.get_str("handled_by"), Some("specific"));

        let cx = dispatch(&router, json!({"command": "/y", "text": ""}));
        assert_eq!(cx.get_str("handled_by"), Some("type_default"));

        let cx = dispatch(&router, json!({"type": "shortcut", "callback_id": "z"}));
        assert_eq!(cx.get_str("handled_by"), Some("global_default"));
    }

    #[test]
    fn test_no_match_is_a_logged_noop() {
        let router = Router::new().command("x", tag("x"));
        let cx = dispatch(&router, json!({"type": "shortcut", "callback_id": "z"}));
        assert!(cx.get("handled_by").is_none());
        assert!(!cx.is_acknowledged());
    }

    #[test]
    fn test_resolve_is_stable_across_lookups() {
        let router = Router::new().command("x", tag("x"));
        let first = router.resolve(PayloadType::Command, Some("x"));
        let second = router.resolve(PayloadType::Command, Some("x"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_identifiers_trimmed_and_last_write_wins() {
        let router = Router::new()
            .command("/deploy ", tag("first"))
            .command("deploy", tag("second"));

        let cx = dispatch(&router, json!({"command": "/deploy", "text": ""}));
        assert_eq!(cx.get_str("handled_by"), Some("second"));
    }

    #[test]
    fn test_interceptors_wrap_routed_listeners() {
        let router = Router::new()
            .command("x", tag("x"))
            .tap(|cx| cx.set("tapped", json!(true)));

        let cx = dispatch(&router, json!({"command": "/x", "text": ""}));
        assert_eq!(cx.get("tapped"), Some(&json!(true)));
        assert_eq!(cx.get_str("handled_by"), Some("x"));
    }

    #[test]
    fn test_event_registration_enables_url_verification_once() {
        let router = Router::new().event("app_mention", tag("mention")).event("app_home_opened", tag("home"));

        let cx = dispatch(&router, json!({"type": "url_verification", "challenge": "ch"}));
        assert_eq!(cx.ack_body(), Some(&json!({"challenge": "ch"})));

        let cx = dispatch(
            &router,
            json!({"type": "event_callback", "event": {"type": "app_mention"}}),
        );
        assert_eq!(cx.get_str("handled_by"), Some("mention"));
    }

    #[test]
    fn test_command_deferred_uses_command_ack() {
        let router = Router::new()
            .with_command_ack(json!({"text": "working..."}))
            .command_deferred("slow", tag("slow"));

        let mut cx = Context::new(Payload::new(json!({"command": "/slow", "text": ""})));
        router.handle(&mut cx).unwrap();
        assert!(cx.is_deferred());
        assert_eq!(cx.ack_body(), Some(&json!({"text": "working..."})));
    }
}
