//! Deferral strategies for the post-ack phase.
//!
//! When a listener defers, the post-ack work runs through a [`Deferrer`]
//! after the HTTP response has been produced: [`PreAckDeferrer`] runs it
//! in-process, [`ShellExecDeferrer`] hands the serialized context to a
//! separate worker process which re-enters it via [`resume`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tracing::debug;

use crate::app::App;
use crate::config::ConfigError;
use crate::context::Context;
use crate::error::Error;
use crate::listeners::Listener;

/// Strategy for running the post-ack phase of a deferred context.
pub trait Deferrer: Send + Sync {
    fn defer(&self, cx: &mut Context) -> Result<(), Error>;
}

/// Runs the post-ack phase in-process by re-entering the listener with
/// the already-acknowledged context. The ack has already been produced,
/// so from the caller's point of view this still happens "after" the
/// response; it just ties up the request handler until the work is done.
pub struct PreAckDeferrer {
    listener: Arc<dyn Listener>,
}

impl PreAckDeferrer {
    pub fn new(listener: Arc<dyn Listener>) -> Self {
        PreAckDeferrer { listener }
    }
}

impl Deferrer for PreAckDeferrer {
    fn defer(&self, cx: &mut Context) -> Result<(), Error> {
        self.listener.handle(cx)
    }
}

/// Hands the post-ack phase to an external worker process. The serialized
/// context is passed as the single CLI argument; the worker is expected
/// to call [`resume`] with it (the bundled binary's `resume` sub-command
/// does exactly that).
pub struct ShellExecDeferrer {
    dir: PathBuf,
    script: String,
}

impl ShellExecDeferrer {
    pub fn new(dir: impl Into<PathBuf>, script: impl Into<String>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ConfigError::InvalidDeferralDir(dir.display().to_string()));
        }
        Ok(ShellExecDeferrer { dir, script: script.into() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Deferrer for ShellExecDeferrer {
    fn defer(&self, cx: &mut Context) -> Result<(), Error> {
        let data = serialize_context(cx)?;
        debug!(target: "deferral", script = %self.script, "spawning deferred worker");
        Command::new(&self.script)
            .arg(&data)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Deferral(format!("failed to spawn `{}`: {e}", self.script)))?;
        Ok(())
    }
}

/// Serializes a deferred context to a single base64 string safe to pass
/// as a CLI argument or message-queue payload.
pub fn serialize_context(cx: &Context) -> Result<String, Error> {
    let json = serde_json::to_vec(&Value::Object(cx.to_map()))
        .map_err(|e| Error::Deferral(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Reverses [`serialize_context`], validating that the context really is
/// a deferred one (acknowledged and marked deferred).
pub fn deserialize_context(data: &str) -> Result<Context, Error> {
    let json = BASE64
        .decode(data.trim())
        .map_err(|e| Error::BadDeferredContext(format!("invalid base64: {e}")))?;
    let value: Value = serde_json::from_slice(&json)
        .map_err(|e| Error::BadDeferredContext(format!("invalid JSON: {e}")))?;
    let map = match value {
        Value::Object(map) => map,
        _ => return Err(Error::BadDeferredContext("not a JSON object".to_string())),
    };

    let cx = Context::from_map(map);
    if !cx.is_acknowledged() || !cx.is_deferred() {
        return Err(Error::BadDeferredContext(
            "context is not a deferred one".to_string(),
        ));
    }
    Ok(cx)
}

/// Re-enters a serialized deferred context through the app, running its
/// post-ack phase.
pub fn resume(app: &App, data: &str) -> Result<(), Error> {
    let mut cx = deserialize_context(data)?;
    debug!(target: "deferral", payload = %cx.payload().summary(), "resuming deferred context");
    app.handle(&mut cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::Callback;
    use crate::payload::Payload;
    use parking_lot::Mutex;
    use serde_json::json;

    fn deferred_context() -> Context {
        let mut cx = Context::new(Payload::new(json!({"command": "/slow", "text": "x"})));
        cx.set("note", json!("kept")).unwrap();
        cx.ack(None).unwrap();
        cx.defer();
        cx
    }

    #[test]
    fn test_serialize_round_trip() {
        let cx = deferred_context();
        let restored = deserialize_context(&serialize_context(&cx).unwrap()).unwrap();
        assert!(restored.is_acknowledged());
        assert!(restored.is_deferred());
        assert_eq!(restored.get_str("note"), Some("kept"));
        assert_eq!(restored.payload().get_str("command"), Some("/slow"));
    }

    #[test]
    fn test_deserialize_rejects_non_deferred_context() {
        let mut cx = Context::new(Payload::new(json!({"command": "/x", "text": ""})));
        cx.ack(None).unwrap();
        let data = serialize_context(&cx).unwrap();
        assert!(matches!(
            deserialize_context(&data),
            Err(Error::BadDeferredContext(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            deserialize_context("not-base64!"),
            Err(Error::BadDeferredContext(_))
        ));
        let data = BASE64.encode(b"[1, 2, 3]");
        assert!(matches!(
            deserialize_context(&data),
            Err(Error::BadDeferredContext(_))
        ));
    }

    #[test]
    fn test_shell_exec_deferrer_requires_existing_dir() {
        assert!(ShellExecDeferrer::new(std::env::temp_dir(), "worker").is_ok());
        assert!(matches!(
            ShellExecDeferrer::new("/definitely/not/a/dir", "worker"),
            Err(ConfigError::InvalidDeferralDir(_))
        ));
    }

    #[test]
    fn test_resume_runs_post_ack_phase_once() {
        let phases: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&phases);
        let app = App::new().command_deferred(
            "slow",
            Callback::new(move |cx| {
                assert!(cx.is_acknowledged());
                seen.lock().push("post_ack");
                Ok(())
            }),
        );

        let data = serialize_context(&deferred_context()).unwrap();
        resume(&app, &data).unwrap();
        assert_eq!(*phases.lock(), ["post_ack"]);
    }
}
