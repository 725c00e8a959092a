//! Slash-command text parsing and sub-command routing.
//!
//! Slack delivers command input as one opaque `text` string. This module
//! gives it structure: [`Definition`] declares a command's args and opts,
//! [`Input`] is the parsed result, [`Command`] wires a definition to a
//! handler, and [`CommandRouter`] fans one slash command out to
//! sub-commands.

mod definition;
mod input;
mod listener;
mod parser;
mod router;
mod token;

pub use definition::{ArgSpec, Definition, DefinitionBuilder, OptSpec, ValueType};
pub use input::{ArgValue, Input};
pub use listener::Command;
pub use parser::{tokenize, ParseError, Parser};
pub use router::CommandRouter;
pub use token::Token;
