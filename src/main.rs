use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

mod clockodo;
mod config;
mod dates;
mod diagnostics;
mod gateway;
mod models;
mod schema;
mod server;

use clockodo::{ClockodoClient, HttpTransport};
use config::Config;
use diagnostics::LogSink;
use gateway::Gateway;
use server::Server;

/// Serves Clockodo users, time entries and projects as MCP resources on stdio.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// API base URL, overrides CLOCKODO_BASE_URL
    #[arg(long)]
    base_url: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log requests and pages at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = Config::from_env()?.with_base_url(cli.base_url);
    log::info!(
        "starting {} for {} (key sha256:{}) against {}",
        server::SERVER_NAME,
        config.credentials.api_user,
        config.credentials.key_fingerprint(),
        config.base_url
    );

    let transport =
        HttpTransport::new(config.base_url.as_str()).context("failed to build HTTP client")?;
    let client = ClockodoClient::new(config.credentials, transport, Arc::new(LogSink))?;
    let server = Server::new(Gateway::new(client));

    let stdin = io::stdin();
    let stdout = io::stdout();
    server
        .serve(stdin.lock(), stdout.lock())
        .context("stdio transport failed")?;
    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.init();
    Ok(())
}
