//! Sub-command routing within a single slash command.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::listeners::Listener;

/// Routes a command to sub-command listeners based on the leading words of
/// its text. Matching is deepest-first: with routes `"cert"` and
/// `"cert renew"` registered, text `cert renew now` routes to
/// `"cert renew"` with `now` left over. The unmatched remainder is stored
/// in the context under `remaining_text`. Unroutable text goes to the
/// default handler if one is set, otherwise it gets a generated listing of
/// the available sub-commands, which is also registered as the `list`
/// sub-command.
pub struct CommandRouter {
    // None marks the built-in sub-command listing.
    routes: BTreeMap<String, Option<Arc<dyn Listener>>>,
    default: Option<Arc<dyn Listener>>,
    description: String,
    max_levels: usize,
}

impl Default for CommandRouter {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("list".to_string(), None);
        CommandRouter { routes, default: None, description: String::new(), max_levels: 1 }
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shown at the top of the generated sub-command listing.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Registers a listener for a sub-command. Multi-word names nest,
    /// e.g. `"cert renew"`.
    pub fn add(mut self, sub_command: &str, listener: impl Listener + 'static) -> Self {
        let name = sub_command.split_whitespace().collect::<Vec<_>>().join(" ");
        self.max_levels = self.max_levels.max(name.split(' ').count());
        self.routes.insert(name, Some(Arc::new(listener)));
        self
    }

    /// Registers a listener for text that matches no sub-command. Without
    /// one, unmatched text gets the generated sub-command listing. The full
    /// text is stored under `remaining_text`.
    pub fn set_default(mut self, listener: impl Listener + 'static) -> Self {
        self.default = Some(Arc::new(listener));
        self
    }

    fn list_sub_commands(&self, cx: &mut Context) -> Result<(), Error> {
        let command = cx.payload().get_str("command").unwrap_or_default().to_string();

        let mut lines = vec![format!("*The {command} Command*")];
        if !self.description.is_empty() {
            lines.push(self.description.clone());
        }
        lines.push("*Available commands*:".to_string());
        for name in self.routes.keys() {
            lines.push(format!("• `{command} {name}`"));
        }

        let message = json!({ "response_type": "ephemeral", "text": lines.join("\n") });
        if cx.is_acknowledged() {
            cx.respond(&message, None)
        } else {
            cx.ack(Some(message))
        }
    }
}

impl Listener for CommandRouter {
    fn handle(&self, cx: &mut Context) -> Result<(), Error> {
        let command = cx.payload().get_str("command").unwrap_or_default().to_string();
        let text = cx.payload().get_str("text").unwrap_or_default().trim().to_string();

        let spans = word_spans(&text);
        let mut depth = spans.len().min(self.max_levels);

        // Deepest sub-command first, backing off to the most generic.
        while depth > 0 {
            let words: Vec<&str> = spans[..depth].iter().map(|&(s, e)| &text[s..e]).collect();
            let sub_command = words.join(" ");
            if let Some(route) = self.routes.get(&sub_command) {
                debug!(
                    target: "dispatch",
                    "routing to sub-command: \"{command} {sub_command}\""
                );
                let remaining = text[spans[depth - 1].1..].trim_start().to_string();
                cx.set("remaining_text", json!(remaining))?;
                return match route {
                    Some(listener) => listener.handle(cx),
                    None => self.list_sub_commands(cx),
                };
            }
            depth -= 1;
        }

        match &self.default {
            Some(listener) => {
                debug!(target: "dispatch", "no sub-command matched, using default handler");
                cx.set("remaining_text", json!(text))?;
                listener.handle(cx)
            }
            None => {
                debug!(target: "dispatch", "no sub-command matched, listing available ones");
                self.list_sub_commands(cx)
            }
        }
    }
}

/// Byte ranges of the whitespace-separated words in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
