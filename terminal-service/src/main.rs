#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! `terminal-service` entry point: loads config, wires the Axum app, starts
//! the session expiry sweeper, and serves until SIGINT/SIGTERM.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use terminal_service::config::Config;
use terminal_service::{routes, state::AppState};

#[derive(Parser)]
#[command(name = "terminal-service", version)]
struct Cli {
    /// Path to a TOML config file. Defaults to `terminal.toml` in the
    /// current directory if present, else compiled defaults.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("terminal-service v{} starting", env!("CARGO_PKG_VERSION"));
    info!("listening on {}", config.server.listen);

    let sweep_interval = config.server.sweep_interval_secs;
    let listen_addr = config.server.listen.clone();
    let state = AppState::new(config);

    let sweeper_sessions = state.sessions.clone();
    let sweeper_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            let swept = sweeper_sessions.sweep().await;
            if swept > 0 {
                info!(count = swept, "expiry sweep removed sessions");
            }
        }
    });

    let app = routes::router(state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .expect("failed to bind listener");

    info!("terminal-service ready");

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("server error");

    sweeper_task.abort();
    info!("terminal-service shut down");
}
