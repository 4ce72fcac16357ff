//! codelens-http entry point.
//!
//! Bootstraps the server with:
//! - Command-line and environment configuration
//! - Logging setup
//! - One-shot secret loading
//! - TCP listener setup
//! - Ctrl-C and idle-timeout shutdown

use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use codelens_http::cli::Args;
use codelens_http::config as codelens_config;
use codelens_http::engine::LexicalEngine;
use codelens_http::security::read_secret_file;
use codelens_http::shutdown::ShutdownReason;
use codelens_http::telemetry::{init_logging, SecurityEvent};
use codelens_http::{security_log, Server, ServerError};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(reason) => {
            tracing::info!(reason = reason.as_str(), "Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ShutdownReason, ServerError> {
    let env = codelens_config::load();
    init_logging(&args.log_config(&env))?;

    let secret = match &args.hmac_file_secret {
        Some(path) => {
            let secret = read_secret_file(path)?;
            let path = path.display().to_string();
            security_log!(
                SecurityEvent::SecretLoaded,
                "HMAC secret loaded and secret file removed",
                "path" => path.as_str()
            );
            Some(secret)
        }
        None => {
            security_log!(
                SecurityEvent::AuthDisabled,
                "No HMAC secret file given; requests are not authenticated"
            );
            None
        }
    };

    let config = args.server_config(&env, secret);
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    println!("serving on http://{addr}");
    tracing::info!(%addr, max_body_bytes = config.max_body_bytes, "Listening");

    let server = Server::new(config, LexicalEngine::new());
    let shutdown = server.shutdown_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                shutdown.trigger(ShutdownReason::Signal);
            }
            Err(e) => tracing::warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });

    server.run(listener).await
}
