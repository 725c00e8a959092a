//! Request-dispatch layer for Slack-style webhook apps.
//!
//! An inbound webhook delivery flows through four stages:
//!
//! 1. [`auth`] verifies the `v0` HMAC signature on the raw request.
//! 2. [`payload`] parses the body into a typed [`payload::Payload`].
//! 3. [`router`] resolves the listener for the payload and runs it
//!    through the app's interceptor chain, with [`context::Context`] as
//!    the per-request state (including the one-shot ack).
//! 4. Deferred work runs after the ack through a [`deferral::Deferrer`],
//!    in-process or via a worker process that resumes the serialized
//!    context.
//!
//! [`gateway::Gateway`] ties the stages together behind an HTTP-agnostic
//! interface; [`server`] is the axum adapter over it. [`commands`] adds
//! structure on top for slash commands: typed arg/opt parsing and
//! sub-command routing.

pub mod app;
pub mod auth;
pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod context;
pub mod deferral;
pub mod error;
pub mod gateway;
pub mod interceptors;
pub mod listeners;
pub mod logging;
pub mod payload;
pub mod router;
pub mod server;

pub use error::Error;
