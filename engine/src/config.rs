// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Application configuration
//!
//! The standalone server reads its configuration from command-line flags. The
//! serverless variant uses a fixed configuration because the host forbids
//! network listeners, loopback included.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;

pub const DEFAULT_HTTP_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_GRPC_ADDRESS: &str = "0.0.0.0:8081";
pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_READ_HEADER_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Serverless hosts only allow writes under /tmp.
pub const LAMBDA_GRPC_SOCKET: &str = "/tmp/grpc.sock";

/// Transport used by a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
    Unix,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => f.write_str("tcp"),
            Network::Unix => f.write_str("unix"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            other => Err(ConfigError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Where a listener binds: a network kind plus an address (host:port or a
/// socket path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub network: Network,
    pub address: String,
}

impl ListenerConfig {
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            network: Network::Tcp,
            address: address.into(),
        }
    }

    pub fn unix(path: impl Into<String>) -> Self {
        Self {
            network: Network::Unix,
            address: path.into(),
        }
    }
}

impl fmt::Display for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}

/// Immutable configuration shared by the entrypoints and the application
/// server. It is built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http: ListenerConfig,
    pub grpc: ListenerConfig,
    /// Operator-facing level name, parsed leniently by [`crate::logging::parse_level`].
    pub log_level: String,
    /// Upper bound on reading request headers from HTTP clients.
    pub read_header_timeout: Duration,
    /// Upper bound on draining in-flight HTTP requests during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: ListenerConfig::tcp(DEFAULT_HTTP_ADDRESS),
            grpc: ListenerConfig::tcp(DEFAULT_GRPC_ADDRESS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            read_header_timeout: DEFAULT_READ_HEADER_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl Config {
    /// Fixed configuration for the serverless variant: gRPC on a Unix socket
    /// under /tmp, HTTP delivered by the platform adapter.
    pub fn lambda() -> Self {
        Self {
            grpc: ListenerConfig::unix(LAMBDA_GRPC_SOCKET),
            ..Self::default()
        }
    }

    /// Returns a copy with the given gRPC listener configuration.
    pub fn with_grpc(mut self, grpc: ListenerConfig) -> Self {
        self.grpc = grpc;
        self
    }

    /// Returns a copy with the given HTTP listener configuration.
    pub fn with_http(mut self, http: ListenerConfig) -> Self {
        self.http = http;
        self
    }
}

/// Serve gRPC and the HTTP/JSON gateway side by side.
#[derive(Parser, Debug, Clone)]
#[command(name = "gw-server")]
#[command(about = "Serve gRPC services and their HTTP/JSON gateway")]
pub struct Args {
    /// The HTTP server network (tcp, unix)
    #[arg(long, default_value = "tcp", value_parser = parse_network)]
    pub http_network: Network,

    /// The HTTP server address (host:port, or a socket path for unix)
    #[arg(long, default_value = DEFAULT_HTTP_ADDRESS)]
    pub http_address: String,

    /// The gRPC server network (tcp, unix)
    #[arg(long, default_value = "tcp", value_parser = parse_network)]
    pub grpc_network: Network,

    /// The gRPC server address (host:port, or a socket path for unix)
    #[arg(long, default_value = DEFAULT_GRPC_ADDRESS)]
    pub grpc_address: String,

    /// The log level (trace, debug, info, warn, error, fatal, panic)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Seconds allowed for an HTTP client to send its request headers
    #[arg(long, default_value = "60")]
    pub read_header_timeout: u64,

    /// Seconds allowed for in-flight HTTP requests to drain on shutdown
    #[arg(long, default_value = "30")]
    pub shutdown_timeout: u64,
}

fn parse_network(s: &str) -> Result<Network, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            http: ListenerConfig {
                network: args.http_network,
                address: args.http_address,
            },
            grpc: ListenerConfig {
                network: args.grpc_network,
                address: args.grpc_address,
            },
            log_level: args.log_level,
            read_header_timeout: Duration::from_secs(args.read_header_timeout),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        }
    }
}
