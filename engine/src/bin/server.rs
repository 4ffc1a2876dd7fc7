// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Standalone entrypoint: gRPC and the HTTP gateway on their own listeners.

use anyhow::Context;
use clap::Parser;
use gw_engine::config::Args;
use gw_engine::{ApplicationServer, Config, Listener, logging};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from(Args::parse());

    let (level, warning) = logging::parse_level(&config.log_level);
    logging::init(level).context("Failed to initialize logging")?;
    if let Some(warning) = warning {
        tracing::error!("{warning}");
    }

    tracing::info!(
        http = %config.http,
        grpc = %config.grpc,
        log_level = %level,
        "Starting application server"
    );

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    // Listeners are dropped (and Unix socket files removed) on every exit path.
    let http_listener = Listener::bind(&config.http)
        .await
        .context("Error creating HTTP listener")?;
    let grpc_listener = Listener::bind(&config.grpc)
        .await
        .context("Error creating gRPC listener")?;

    let mut app = ApplicationServer::new(config);
    app.init()
        .await
        .context("Error initializing application server")?;

    let ctx = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            tokio::select! {
                _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            }
            ctx.cancel();
        }
    });

    app.serve(&ctx, grpc_listener, http_listener)
        .await
        .context("Error serving application server")?;

    tracing::info!("Application server stopped");
    Ok(())
}
