//! The top-level application: a router plus its configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::clients::{ApiClient, HttpApiClient, HttpRespondClient, RespondClient};
use crate::commands::CommandRouter;
use crate::config::{AppConfig, ConfigError};
use crate::context::Context;
use crate::error::Error;
use crate::interceptors::Interceptor;
use crate::listeners::{Listener, ListenerRegistry};
use crate::payload::PayloadType;
use crate::router::Router;

/// An application binds an [`AppConfig`] to a [`Router`] and prepares each
/// inbound [`Context`] before routing: it reconciles the payload's app ID
/// against the configured one, injects HTTP clients, and guarantees every
/// non-deferred dispatch ends acknowledged.
pub struct App {
    router: Router,
    config: AppConfig,
    registry: ListenerRegistry,
    api_client: RwLock<Option<Arc<dyn ApiClient>>>,
    respond_client: RwLock<Option<Arc<dyn RespondClient>>>,
}

impl Default for App {
    fn default() -> Self {
        App {
            router: Router::new(),
            config: AppConfig::new(),
            registry: ListenerRegistry::new(),
            api_client: RwLock::new(None),
            respond_client: RwLock::new(None),
        }
    }
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Overrides the API client injected into contexts. Mostly useful for
    /// tests; by default a client is built from the configured bot token.
    pub fn with_api_client(self, client: Arc<dyn ApiClient>) -> Self {
        *self.api_client.write() = Some(client);
        self
    }

    pub fn with_respond_client(self, client: Arc<dyn RespondClient>) -> Self {
        *self.respond_client.write() = Some(client);
        self
    }

    /// Registers a listener by name for later lookup via
    /// [`App::listener`]. Names decouple wiring from construction when
    /// routes are assembled from configuration.
    pub fn register_listener(self, name: &str, listener: impl Listener + 'static) -> Self {
        self.registry.register(name, Arc::new(listener));
        self
    }

    pub fn listener(&self, name: &str) -> Result<Arc<dyn Listener>, ConfigError> {
        self.registry.resolve(name)
    }

    pub fn command(mut self, name: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.command(name, listener);
        self
    }

    pub fn command_deferred(mut self, name: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.command_deferred(name, listener);
        self
    }

    pub fn command_group(mut self, name: &str, group: CommandRouter) -> Self {
        self.router = self.router.command_group(name, group);
        self
    }

    pub fn command_group_deferred(mut self, name: &str, group: CommandRouter) -> Self {
        self.router = self.router.command_group_deferred(name, group);
        self
    }

    pub fn event(mut self, name: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.event(name, listener);
        self
    }

    pub fn event_deferred(mut self, name: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.event_deferred(name, listener);
        self
    }

    pub fn global_shortcut(mut self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.global_shortcut(callback_id, listener);
        self
    }

    pub fn message_shortcut(mut self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.message_shortcut(callback_id, listener);
        self
    }

    pub fn block_action(mut self, action_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.block_action(action_id, listener);
        self
    }

    pub fn block_suggestion(mut self, action_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.block_suggestion(action_id, listener);
        self
    }

    pub fn view_submission(mut self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.view_submission(callback_id, listener);
        self
    }

    pub fn view_closed(mut self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.view_closed(callback_id, listener);
        self
    }

    pub fn workflow_step_edit(mut self, callback_id: &str, listener: impl Listener + 'static) -> Self {
        self.router = self.router.workflow_step_edit(callback_id, listener);
        self
    }

    pub fn on(mut self, kind: PayloadType, listener: impl Listener + 'static) -> Self {
        self.router = self.router.on(kind, listener);
        self
    }

    pub fn any(mut self, listener: impl Listener + 'static) -> Self {
        self.router = self.router.any(listener);
        self
    }

    pub fn tap<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.router = self.router.tap(callback);
        self
    }

    pub fn use_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.router = self.router.use_interceptor(interceptor);
        self
    }

    pub fn with_command_ack(mut self, body: Value) -> Self {
        self.router = self.router.with_command_ack(body);
        self
    }

    pub fn with_url_verification(mut self) -> Self {
        self.router = self.router.with_url_verification();
        self
    }

    /// Prepares a context for routing: app-ID reconciliation and HTTP
    /// client injection.
    fn bind(&self, cx: &mut Context) -> Result<(), Error> {
        if let (Some(context_id), Some(config_id)) = (cx.app_id(), self.config.id()) {
            if context_id != config_id {
                return Err(Error::AppIdMismatch {
                    context: context_id.to_string(),
                    config: config_id.to_string(),
                });
            }
        }

        if !cx.has_api_client() {
            if let Some(client) = self.api_client()? {
                cx.with_api_client(client);
            }
        }
        if !cx.has_respond_client() {
            cx.with_respond_client(self.respond_client()?);
        }

        Ok(())
    }

    /// The shared API client, built on first use from the configured bot
    /// token. `None` when no token is configured.
    fn api_client(&self) -> Result<Option<Arc<dyn ApiClient>>, Error> {
        if let Some(client) = self.api_client.read().clone() {
            return Ok(Some(client));
        }
        let token = match self.config.bot_token() {
            Some(token) => token,
            None => return Ok(None),
        };
        let client: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(token)?);
        *self.api_client.write() = Some(Arc::clone(&client));
        Ok(Some(client))
    }

    fn respond_client(&self) -> Result<Arc<dyn RespondClient>, Error> {
        if let Some(client) = self.respond_client.read().clone() {
            return Ok(client);
        }
        let client: Arc<dyn RespondClient> = Arc::new(HttpRespondClient::new()?);
        *self.respond_client.write() = Some(Arc::clone(&client));
        Ok(client)
    }
}

impl Listener for App {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        self.bind(cx)?;
        debug!(target: "dispatch", payload = %cx.payload().summary(), "dispatching payload");
        self.router.handle(cx)?;

        // Every synchronous dispatch must end acknowledged; deferred
        // dispatches were acknowledged in their pre-ack phase.
        if !cx.is_acknowledged() {
            cx.ack(None)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::Callback;
    use crate::payload::Payload;
    use serde_json::json;

    fn noop_respond_client() -> Arc<dyn RespondClient> {
        struct Noop;
        impl RespondClient for Noop {
            fn respond(&self, _url: &str, _message: &Value) -> Result<(), crate::clients::ApiError> {
                Ok(())
            }
        }
        Arc::new(Noop)
    }

    fn app() -> App {
        App::new()
            .with_respond_client(noop_respond_client())
            .command("greet", Callback::new(|cx| cx.ack_text("hi")))
    }

    #[test]
    fn test_auto_ack_when_listener_does_not_ack() {
        let app = App::new()
            .with_respond_client(noop_respond_client())
            .command("quiet", Callback::new(|_| Ok(())));

        let mut cx = Context::new(Payload::new(json!({"command": "/quiet", "text": ""})));
        app.handle(&mut cx).unwrap();
        assert!(cx.is_acknowledged());
        assert_eq!(cx.ack_body(), None);
    }

    #[test]
    fn test_listener_ack_is_preserved() {
        let mut cx = Context::new(Payload::new(json!({"command": "/greet", "text": ""})));
        app().handle(&mut cx).unwrap();
        assert_eq!(cx.ack_body(), Some(&json!({"text": "hi"})));
    }

    #[test]
    fn test_app_id_mismatch_is_rejected() {
        let app = app().with_config(AppConfig::new().with_id("A111"));
        let mut cx = Context::new(Payload::new(json!({
            "command": "/greet", "text": "", "api_app_id": "A222"
        })));
        assert!(matches!(
            app.handle(&mut cx),
            Err(Error::AppIdMismatch { .. })
        ));
    }

    #[test]
    fn test_matching_app_id_is_accepted() {
        let app = app().with_config(AppConfig::new().with_id("A111"));
        let mut cx = Context::new(Payload::new(json!({
            "command": "/greet", "text": "", "api_app_id": "A111"
        })));
        app.handle(&mut cx).unwrap();
        assert!(cx.is_acknowledged());
    }

    #[test]
    fn test_named_listener_registry() {
        let app = app().register_listener("greeter", Callback::new(|cx| cx.ack_text("hi")));
        assert!(app.listener("greeter").is_ok());
        assert!(app.listener("missing").is_err());
    }
}
