// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ServeError;
use crate::listener::{Listener, is_transient};

/// HTTP/1.1 server settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HttpSettings {
    pub read_header_timeout: Duration,
    pub shutdown_timeout: Duration,
}

/// Accepts connections until `graceful` is cancelled or accepting fails,
/// then closes the listener and waits for in-flight requests to finish.
///
/// Connections still open after the shutdown timeout are aborted.
pub(crate) async fn serve(
    listener: Listener,
    router: Router,
    settings: HttpSettings,
    graceful: CancellationToken,
) -> Result<(), ServeError> {
    let address = listener
        .local_addr()
        .unwrap_or_else(|_| "<unknown>".to_string());

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(settings.read_header_timeout);

    let shutdown = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    let accept_error = loop {
        tokio::select! {
            accepted = listener.accept() => {
                let conn = match accepted {
                    Ok(conn) => conn,
                    Err(e) if is_transient(&e) => {
                        warn!(address = %address, error = %e, "Transient error accepting HTTP connection");
                        continue;
                    }
                    Err(source) => break Some(source),
                };

                let service = TowerToHyperService::new(router.clone());
                let connection = shutdown.watch(builder.serve_connection(TokioIo::new(conn), service));
                connections.spawn(async move {
                    if let Err(e) = connection.await {
                        debug!(error = %e, "Error serving HTTP connection");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = graceful.cancelled() => break None,
        }
    };

    drop(listener);

    let drained = tokio::time::timeout(settings.shutdown_timeout, shutdown.shutdown()).await;
    if drained.is_err() {
        warn!(
            address = %address,
            open = connections.len(),
            "HTTP shutdown timed out; aborting open connections"
        );
        connections.abort_all();
    }
    while connections.join_next().await.is_some() {}

    match (accept_error, drained) {
        (Some(source), _) => Err(ServeError::Accept { address, source }),
        (None, Err(_)) => Err(ServeError::ShutdownTimeout {
            transport: "HTTP",
            timeout: settings.shutdown_timeout,
        }),
        (None, Ok(())) => Ok(()),
    }
}
