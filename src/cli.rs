//! Command-line interface for the bundled binary.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nacre", version, about = "Webhook dispatch gateway for Slack-style apps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (the default).
    Start {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3000)]
        port: u16,

        /// Emit logs as JSON instead of plain text.
        #[arg(long)]
        json_logs: bool,
    },

    /// Run the post-ack phase of a serialized deferred context.
    ///
    /// This is the worker entry point used by the out-of-process
    /// deferrer, which passes the base64 context as the argument.
    Resume {
        context: String,

        /// Exit 0 even when the deferred work fails. Useful when the
        /// invoking supervisor treats nonzero exits as retryable.
        #[arg(long)]
        soft_exit: bool,
    },
}
