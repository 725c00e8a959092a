//! The dispatch-level error type.
//!
//! Each concern has its own error enum ([`crate::auth::AuthError`],
//! [`crate::payload::PayloadError`], [`crate::config::ConfigError`],
//! [`crate::commands::ParseError`]); this one covers failures raised
//! while a context is being handled.

use thiserror::Error;

use crate::clients::ApiError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("context was already acknowledged")]
    AlreadyAcknowledged,

    #[error("cannot set reserved context key: `{0}`")]
    ReservedKey(String),

    #[error("payload app ID `{context}` does not match configured app ID `{config}`")]
    AppIdMismatch { context: String, config: String },

    #[error("payload carries no response URL and none was provided")]
    MissingResponseUrl,

    #[error("no API client available; is a bot token configured?")]
    NoApiClient,

    #[error("no respond client available")]
    NoRespondClient,

    #[error("url_verification payload carries no challenge")]
    MissingChallenge,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid deferred context: {0}")]
    BadDeferredContext(String),

    #[error("deferral failed: {0}")]
    Deferral(String),

    #[error("listener failed: {0}")]
    Listener(String),
}
