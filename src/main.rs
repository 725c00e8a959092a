use std::net::ToSocketAddrs;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use nacre::app::App;
use nacre::cli::{Cli, Command};
use nacre::config::AppConfig;
use nacre::gateway::Gateway;
use nacre::listeners::Callback;
use nacre::logging::{init_logging, LogConfig, LogFormat};
use nacre::server::run_server;
use nacre::{deferral, Error};

fn main() -> ExitCode {
    match Cli::parse().command {
        Some(Command::Start { host, port, json_logs }) => start(&host, port, json_logs),
        None => start("127.0.0.1", 3000, false),
        Some(Command::Resume { context, soft_exit }) => resume(&context, soft_exit),
    }
}

/// Example wiring: an echo command plus URL verification. A real
/// deployment builds its own [`App`] against the library instead.
fn build_app(config: AppConfig) -> App {
    App::new()
        .with_config(config)
        .with_url_verification()
        .command(
            "echo",
            Callback::new(|cx| {
                let text = cx.payload().get_str("text").unwrap_or("").to_string();
                cx.ack_text(&text)
            }),
        )
}

fn load_config() -> Result<AppConfig, ExitCode> {
    AppConfig::from_env("SLACK").map_err(|err| {
        error!(target: "config", error = %err, "failed to load configuration");
        ExitCode::FAILURE
    })
}

fn start(host: &str, port: u16, json_logs: bool) -> ExitCode {
    let format = if json_logs { LogFormat::Json } else { LogFormat::Plain };
    init_logging(&LogConfig { format, ..LogConfig::default() });

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    let addr = match (host, port).to_socket_addrs().ok().and_then(|mut addrs| addrs.next()) {
        Some(addr) => addr,
        None => {
            error!(target: "server", host, port, "could not resolve listen address");
            return ExitCode::FAILURE;
        }
    };

    let gateway = Arc::new(Gateway::new(Arc::new(build_app(config))));
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(target: "server", error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_server(gateway, addr)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "server", error = %err, "server terminated");
            ExitCode::FAILURE
        }
    }
}

fn resume(context: &str, soft_exit: bool) -> ExitCode {
    init_logging(&LogConfig::default());

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    match deferral::resume(&build_app(config), context) {
        Ok(()) => {
            info!(target: "deferral", "deferred work completed");
            ExitCode::SUCCESS
        }
        Err(err @ Error::BadDeferredContext(_)) => {
            error!(target: "deferral", error = %err, "refusing to resume context");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(target: "deferral", error = %err, "deferred work failed");
            if soft_exit {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
