//! crowntalk HTTP service
//!
//! Usage: `crowntalk [CONFIG.json]`
//!
//! Configuration is read from the optional JSON file, then overridden from the
//! environment (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `CROWNTALK_BIND`, `PORT`,
//! `CROWNTALK_KEEP_ALIVE_URL`). Log filtering follows `RUST_LOG` (default `info`).

use crowntalk::{BatchRunner, Config, run_with_shutdown};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "crowntalk exited with an error");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> crowntalk::Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading configuration");
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    config.apply_env()?;

    let runner = BatchRunner::new(config)?;

    if runner.spawn_keep_alive()?.is_none() {
        tracing::debug!("Keep-alive disabled");
    }
    let mut server = runner.spawn_api_server();

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own when it fails to bind or crashes
            runner.shutdown();
            result.map_err(|e| crowntalk::Error::ApiServerError(e.to_string()))?
        }
        result = run_with_shutdown(&runner) => {
            result?;
            // Graceful shutdown: wait for in-flight requests to finish
            server
                .await
                .map_err(|e| crowntalk::Error::ApiServerError(e.to_string()))?
        }
    }
}
