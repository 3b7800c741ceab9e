// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dragnetd` — the dragnet daemon binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, UnixListener};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dn_daemon::{listener, Daemon, DaemonConfig};

#[derive(Parser)]
#[command(name = "dragnetd", about = "Reconnaissance scan orchestration daemon")]
struct Args {
    /// Working-directory root (defaults to $DRAGNET_HOME or ~/.dragnet)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Additionally listen on this TCP address (e.g. 127.0.0.1:7878)
    #[arg(long)]
    tcp: Option<String>,

    /// Disable the LLM triage adapter
    #[arg(long)]
    no_triage: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let config = DaemonConfig {
        root: args.root.unwrap_or_else(dn_daemon::env::default_root),
        tcp: args.tcp,
        triage_enabled: !args.no_triage,
        ..DaemonConfig::default()
    };

    let daemon = match Daemon::start(config.clone()) {
        Ok(daemon) => daemon,
        Err(error) => {
            eprintln!("dragnetd: {error}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let file_appender = tracing_appender::rolling::daily(&daemon.paths.logs, "dragnetd.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    tracing::info!(root = %daemon.paths.root.display(), "dragnetd starting");

    if let Err(error) = daemon.spawn_workers().await {
        tracing::error!(%error, "worker startup failed");
        return std::process::ExitCode::FAILURE;
    }

    // Replace a stale socket from an unclean shutdown; the flock already
    // guarantees we are the only instance.
    if daemon.paths.socket.exists() {
        let _ = std::fs::remove_file(&daemon.paths.socket);
    }
    let unix = match UnixListener::bind(&daemon.paths.socket) {
        Ok(unix) => unix,
        Err(error) => {
            tracing::error!(%error, "cannot bind unix socket");
            return std::process::ExitCode::FAILURE;
        }
    };
    let tcp = match &config.tcp {
        Some(addr) => match TcpListener::bind(addr).await {
            Ok(tcp) => {
                tracing::info!(%addr, "tcp listener bound");
                Some(tcp)
            }
            Err(error) => {
                tracing::error!(%addr, %error, "cannot bind tcp listener");
                return std::process::ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let serve = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { listener::serve(daemon, unix, tcp).await })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            daemon.shutdown.cancel();
        }
        _ = daemon.shutdown.cancelled() => {}
    }

    let _ = serve.await;
    let _ = std::fs::remove_file(&daemon.paths.socket);
    tracing::info!("dragnetd stopped");
    std::process::ExitCode::SUCCESS
}
