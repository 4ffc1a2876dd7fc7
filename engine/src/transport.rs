// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use crate::config::{ListenerConfig, Network};
use crate::error::InitError;

const UNIX_SCHEME: &str = "unix://";

/// The address the gateway dials to reach the gRPC server.
///
/// Unix sockets are written as `unix://<path>`; TCP addresses are used as is.
pub fn grpc_endpoint(config: &ListenerConfig) -> String {
    match config.network {
        Network::Unix => format!("{UNIX_SCHEME}{}", config.address),
        Network::Tcp => config.address.clone(),
    }
}

/// Creates a plaintext channel to `endpoint` without connecting.
///
/// The first RPC establishes the connection, so initialization never blocks
/// on the gRPC server being up yet.
pub fn connect_lazy(endpoint: &str) -> Result<Channel, InitError> {
    let invalid = |source| InitError::Endpoint {
        endpoint: endpoint.to_string(),
        source,
    };

    if let Some(path) = endpoint.strip_prefix(UNIX_SCHEME) {
        let path = path.to_string();
        // The URI is ignored by the connector; it only has to parse.
        let channel = Endpoint::try_from("http://[::]:50051")
            .map_err(invalid)?
            .connect_with_connector_lazy(service_fn(move |_: Uri| {
                let path = path.clone();
                async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
            }));
        return Ok(channel);
    }

    let channel = Endpoint::from_shared(format!("http://{endpoint}"))
        .map_err(invalid)?
        .connect_lazy();
    Ok(channel)
}
