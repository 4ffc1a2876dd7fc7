// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Serverless entrypoint.
//!
//! The platform forbids inbound network sockets, loopback included, so the
//! gRPC server listens on a Unix socket under /tmp. HTTP events from the
//! platform go straight to the gateway mux, which dials that socket; calls
//! still pass through the gRPC server and its request logging.

use anyhow::Context;
use gw_engine::{ApplicationServer, Config, Listener, logging};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::lambda();
    let (level, _) = logging::parse_level(&config.log_level);
    logging::init(level).context("Failed to initialize logging")?;

    let grpc_listener = Listener::bind(&config.grpc)
        .await
        .context("Error creating gRPC listener")?;

    let mut app = ApplicationServer::new(config);
    app.init()
        .await
        .context("Error initializing application server")?;
    let mux = app.gateway().context("Error getting gateway mux")?;

    // The platform freezes or kills the process between invocations; the
    // token is never cancelled.
    let ctx = CancellationToken::new();
    tokio::spawn(async move {
        if let Err(e) = app.serve_grpc(&ctx, grpc_listener).await {
            tracing::error!(error = %e, "Error serving application server");
        }
    });

    lambda_http::run(mux.router())
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Error running serverless handler")
}
