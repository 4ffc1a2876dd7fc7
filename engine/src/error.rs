// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

/// Invalid configuration or listener setup. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported network {0:?} (expected tcp or unix)")]
    UnsupportedNetwork(String),
    #[error("could not bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not prepare socket path {path}: {source}")]
    SocketPath {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A step of application server initialization failed.
#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid gRPC endpoint {endpoint}: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("error registering {service} gateway handler: {reason}")]
    Gateway { service: &'static str, reason: String },
    #[error("error building reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
}

/// The application server was used out of order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("application is already initialized")]
    AlreadyInitialized,
    #[error("application is not initialized")]
    NotInitialized,
    #[error("application initialization failed; the server is unusable")]
    InitializationFailed,
}

/// A transport serve loop terminated abnormally.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("gRPC server error: {0}")]
    Grpc(#[from] tonic::transport::Error),
    #[error("error accepting connection on {address}: {source}")]
    Accept {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{transport} shutdown did not complete within {timeout:?}")]
    ShutdownTimeout {
        transport: &'static str,
        timeout: std::time::Duration,
    },
    #[error("serve task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
