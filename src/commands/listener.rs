//! Listener wrapper that parses command text before invoking a handler.

use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::listeners::Listener;

use super::definition::Definition;
use super::input::Input;

/// A listener for one command shape: parses the payload's `text` against
/// a [`Definition`] and passes the typed [`Input`] to the handler. On a
/// parse failure the user gets the usage message (as the ack, or via
/// `response_url` when already acknowledged) and the error is not
/// propagated.
pub struct Command {
    definition: Definition,
    handler: Box<dyn Fn(&mut Context, &Input) -> Result<(), Error> + Send + Sync>,
}

impl Command {
    pub fn new<F>(definition: Definition, handler: F) -> Self
    where
        F: Fn(&mut Context, &Input) -> Result<(), Error> + Send + Sync + 'static,
    {
        Command { definition, handler: Box::new(handler) }
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }
}

impl Listener for Command {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        let text = cx.payload().get_str("text").unwrap_or_default().to_string();
        match Input::parse(&text, &self.definition) {
            Ok(input) => (self.handler)(cx, &input),
            Err(err) => {
                debug!(
                    target: "dispatch",
                    command = self.definition.name(),
                    error = %err,
                    "command text failed to parse, sending usage"
                );
                let message = self.definition.help_message(Some(&err.to_string()));
                if cx.is_acknowledged() {
                    cx.respond(&message, None)
                } else {
                    cx.ack(Some(message))
                }
            }
        }
    }
}
