// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;

use gw_engine::proto::example::v1::ping_service_client::PingServiceClient;
use gw_engine::{ApplicationServer, Config, Listener, ListenerConfig, ServeError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// An application server serving both transports in a background task.
pub struct RunningServer {
    pub ctx: CancellationToken,
    pub grpc: ListenerConfig,
    pub http: ListenerConfig,
    pub handle: JoinHandle<Result<(), ServeError>>,
}

impl RunningServer {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.http.address, path)
    }

    pub async fn grpc_client(&self) -> PingServiceClient<Channel> {
        PingServiceClient::connect(format!("http://{}", self.grpc.address))
            .await
            .expect("gRPC server should accept connections")
    }

    /// Cancels the shared context and waits for `serve` to return.
    pub async fn shutdown(self) -> Result<(), ServeError> {
        self.ctx.cancel();
        tokio::time::timeout(SHUTDOWN_DEADLINE, self.handle)
            .await
            .expect("serve should return after cancellation")
            .expect("serve task should not panic")
    }
}

/// Binds both listeners with the given configs, initializes the server
/// against the actually bound gRPC address and starts serving.
pub async fn start(grpc: ListenerConfig, http: ListenerConfig) -> RunningServer {
    let grpc_listener = Listener::bind(&grpc).await.unwrap();
    let http_listener = Listener::bind(&http).await.unwrap();
    let grpc = grpc_listener.local_config().unwrap();
    let http = http_listener.local_config().unwrap();

    let config = Config::default()
        .with_grpc(grpc.clone())
        .with_http(http.clone());
    let mut app = ApplicationServer::new(config);
    app.init().await.unwrap();

    let ctx = CancellationToken::new();
    let handle = tokio::spawn({
        let ctx = ctx.clone();
        async move { app.serve(&ctx, grpc_listener, http_listener).await }
    });

    RunningServer {
        ctx,
        grpc,
        http,
        handle,
    }
}

/// Both transports on ephemeral loopback ports.
pub async fn start_tcp() -> RunningServer {
    start(
        ListenerConfig::tcp("127.0.0.1:0"),
        ListenerConfig::tcp("127.0.0.1:0"),
    )
    .await
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Shuts the listening socket down so that every further accept fails.
pub fn break_listener(listener: &Listener) {
    // SAFETY: the descriptor belongs to `listener`, which outlives the call.
    let rc = unsafe { libc::shutdown(listener.as_fd().as_raw_fd(), libc::SHUT_RDWR) };
    assert_eq!(rc, 0, "shutdown failed: {}", std::io::Error::last_os_error());
}
