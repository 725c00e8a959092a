//! HTTP-agnostic request dispatch.
//!
//! The [`Gateway`] owns the full life of one webhook delivery:
//! authenticate the raw request, parse it into a [`Payload`], run the
//! [`App`], hand deferred work to the configured [`Deferrer`], and shape
//! the ack into an HTTP-ready [`AckResponse`]. The HTTP server in
//! [`crate::server`] is a thin adapter over this type.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info_span, warn};
use uuid::Uuid;

use crate::app::App;
use crate::auth::{self, AuthError};
use crate::config::{ConfigError, CredentialsStore};
use crate::context::Context;
use crate::deferral::{Deferrer, PreAckDeferrer};
use crate::error::Error as AppError;
use crate::listeners::Listener;
use crate::payload::{Payload, PayloadError};

/// The parts of an inbound HTTP request the gateway needs.
pub struct RawRequest<'a> {
    pub body: &'a [u8],
    pub content_type: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
}

/// The acknowledgement to send back, already serialized.
#[derive(Debug, PartialEq, Eq)]
pub struct AckResponse {
    pub status: u16,
    pub body: Option<String>,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unreadable payload: {0}")]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error("dispatch finished without acknowledging")]
    NoAck,
}

impl GatewayError {
    /// The HTTP status this failure maps to. Authentication failures are
    /// 401, unreadable payloads 400, everything else is on us.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Auth(_) => 401,
            GatewayError::Payload(_) => 400,
            _ => 500,
        }
    }
}

pub struct Gateway {
    app: Arc<App>,
    credentials: Option<Arc<dyn CredentialsStore>>,
    deferrer: Arc<dyn Deferrer>,
}

impl Gateway {
    /// Wraps an app with the default in-process deferrer.
    pub fn new(app: Arc<App>) -> Self {
        let listener: Arc<dyn Listener> = Arc::clone(&app) as Arc<dyn Listener>;
        Gateway {
            app,
            credentials: None,
            deferrer: Arc::new(PreAckDeferrer::new(listener)),
        }
    }

    /// Uses a credentials store for apps whose signing secret is not in
    /// the static config (e.g. multi-workspace installs).
    pub fn with_credentials_store(mut self, store: Arc<dyn CredentialsStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_deferrer(mut self, deferrer: Arc<dyn Deferrer>) -> Self {
        self.deferrer = deferrer;
        self
    }

    /// Runs one webhook delivery end to end. Returns the ack to send, or
    /// the error to map to an HTTP status via [`GatewayError::status`].
    pub fn dispatch(&self, request: &RawRequest<'_>) -> Result<AckResponse, GatewayError> {
        let span = info_span!("dispatch", request_id = %Uuid::new_v4());
        let _guard = span.enter();

        self.authenticate(request)?;

        let payload = Payload::from_http_request(request.body, request.content_type.unwrap_or(""))?;
        let mut cx = Context::new(payload);
        self.app.handle(&mut cx)?;

        if !cx.is_acknowledged() {
            return Err(GatewayError::NoAck);
        }
        let response = AckResponse {
            status: 200,
            body: cx.ack_body().map(|body| body.to_string()),
        };

        // The ack is already fixed; a post-ack failure must not turn a
        // delivered request into an HTTP error.
        if cx.is_deferred() {
            if let Err(err) = self.deferrer.defer(&mut cx) {
                error!(target: "dispatch", error = %err, "deferred phase failed");
            }
        }

        Ok(response)
    }

    fn authenticate(&self, request: &RawRequest<'_>) -> Result<(), GatewayError> {
        let config = self.app.config();
        if config.skip_auth() {
            warn!(target: "auth", "signature verification is disabled");
            return Ok(());
        }

        let secret = match config.signing_secret() {
            Some(secret) => secret.to_string(),
            None => match &self.credentials {
                Some(store) => store.credentials(config.id())?.signing_secret,
                None => return Err(ConfigError::MissingSigningSecret.into()),
            },
        };

        let signature = request.signature.ok_or(AuthError::MissingHeaders)?;
        let timestamp = request
            .timestamp
            .ok_or(AuthError::MissingHeaders)?
            .trim()
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidTimestamp)?;

        auth::verify_now(signature, timestamp, request.body, &secret, config.max_clock_skew())?;
        Ok(())
    }
}
