// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Application server
//!
//! [`ApplicationServer`] wires the registered services once and serves them
//! over gRPC and the HTTP/JSON gateway. It is constructed empty, populated by
//! [`ApplicationServer::init`], and then served any number of times through
//! [`ApplicationServer::serve`], [`ApplicationServer::serve_grpc`] or
//! [`ApplicationServer::serve_http`]. Every handle built during init is
//! read-only afterwards.

mod http_server;
pub mod interceptor;

use std::sync::Arc;

use tonic::service::{Routes, RoutesBuilder};
use tonic::transport::Server;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{InitError, LifecycleError, ServeError};
use crate::gateway::{ServeMux, ServeMuxBuilder, UnescapingMode};
use crate::listener::Listener;
use crate::logging;
use crate::proto;
use crate::registry::ServiceRegistry;
use crate::serve::{TaskGroup, serve_with_context};
use crate::transport;

use self::http_server::HttpSettings;
use self::interceptor::RequestLoggingLayer;

/// Handles populated by init.
#[derive(Debug)]
struct Handles {
    routes: Routes,
    mux: ServeMux,
    http: HttpSettings,
}

#[derive(Debug)]
enum Lifecycle {
    Constructed,
    Initialized(Arc<Handles>),
    Failed,
}

/// The application: one set of services served over two transports.
#[derive(Debug)]
pub struct ApplicationServer {
    config: Config,
    registry: ServiceRegistry,
    state: Lifecycle,
}

impl ApplicationServer {
    /// Creates an uninitialized server exposing the default services.
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, ServiceRegistry::default_services())
    }

    pub fn with_registry(config: Config, registry: ServiceRegistry) -> Self {
        Self {
            config,
            registry,
            state: Lifecycle::Constructed,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, Lifecycle::Initialized(_))
    }

    /// Builds the gRPC routes, the gateway and the HTTP settings.
    ///
    /// The gateway dials the gRPC server lazily, so init succeeds before the
    /// gRPC listener is being served. Init may only be called once; if it
    /// fails the server is unusable.
    pub async fn init(&mut self) -> Result<(), InitError> {
        match self.state {
            Lifecycle::Constructed => {}
            Lifecycle::Initialized(_) => return Err(LifecycleError::AlreadyInitialized.into()),
            Lifecycle::Failed => return Err(LifecycleError::InitializationFailed.into()),
        }

        match self.build_handles() {
            Ok(handles) => {
                self.state = Lifecycle::Initialized(Arc::new(handles));
                debug!(services = ?self.registry.names(), "Application server initialized");
                Ok(())
            }
            Err(e) => {
                self.state = Lifecycle::Failed;
                Err(e)
            }
        }
    }

    fn build_handles(&self) -> Result<Handles, InitError> {
        // gRPC services, with reflection for tools such as grpcurl.
        let reflection_v1 = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;
        let reflection_v1alpha = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;

        let mut routes = RoutesBuilder::default();
        routes.add_service(reflection_v1).add_service(reflection_v1alpha);
        self.registry.register_rpc(&mut routes);

        // Gateway handlers call back into the gRPC server over a local channel.
        // Escaped slashes must survive into path parameters.
        let mut mux = ServeMuxBuilder::new().unescaping_mode(UnescapingMode::AllExceptReserved);
        let endpoint = transport::grpc_endpoint(&self.config.grpc);
        let channel = transport::connect_lazy(&endpoint)?;
        self.registry.register_gateway(&mut mux, &channel)?;
        debug!(endpoint = %endpoint, "Registered gateway handlers");

        let http = HttpSettings {
            read_header_timeout: self.config.read_header_timeout,
            shutdown_timeout: self.config.shutdown_timeout,
        };

        // Request logging replaces the RPC stack's own diagnostics.
        logging::silence_rpc_library_logs();

        Ok(Handles {
            routes: routes.routes(),
            mux: mux.build(),
            http,
        })
    }

    fn handles(&self) -> Result<Arc<Handles>, LifecycleError> {
        match &self.state {
            Lifecycle::Initialized(handles) => Ok(Arc::clone(handles)),
            Lifecycle::Constructed => Err(LifecycleError::NotInitialized),
            Lifecycle::Failed => Err(LifecycleError::InitializationFailed),
        }
    }

    /// The gateway translator, for callers that deliver HTTP requests
    /// themselves (the serverless adapter).
    pub fn gateway(&self) -> Result<ServeMux, LifecycleError> {
        self.handles().map(|handles| handles.mux.clone())
    }

    /// Serves gRPC and HTTP until `ctx` is cancelled or either transport
    /// stops. Whichever transport stops first shuts the other one down; the
    /// first error is returned.
    pub async fn serve(
        &self,
        ctx: &CancellationToken,
        grpc_listener: Listener,
        http_listener: Listener,
    ) -> Result<(), ServeError> {
        let handles = self.handles()?;

        let mut group = TaskGroup::new(ctx);
        let grpc_ctx = group.token();
        group.spawn({
            let handles = Arc::clone(&handles);
            async move { serve_grpc(&grpc_ctx, handles, grpc_listener).await }
        });
        let http_ctx = group.token();
        group.spawn(async move { serve_http(&http_ctx, handles, http_listener).await });

        info!("Application server started");
        group.wait().await
    }

    /// Serves gRPC on `listener` until `ctx` is cancelled or the server fails.
    ///
    /// On cancellation the server stops accepting calls, lets in-flight calls
    /// finish and closes the listener.
    pub async fn serve_grpc(
        &self,
        ctx: &CancellationToken,
        listener: Listener,
    ) -> Result<(), ServeError> {
        serve_grpc(ctx, self.handles()?, listener).await
    }

    /// Serves the HTTP gateway on `listener` until `ctx` is cancelled or the
    /// server fails.
    ///
    /// On cancellation the listener is closed and in-flight requests get up to
    /// the configured shutdown timeout to complete.
    pub async fn serve_http(
        &self,
        ctx: &CancellationToken,
        listener: Listener,
    ) -> Result<(), ServeError> {
        serve_http(ctx, self.handles()?, listener).await
    }
}

async fn serve_grpc(
    ctx: &CancellationToken,
    handles: Arc<Handles>,
    listener: Listener,
) -> Result<(), ServeError> {
    let address = display_addr(&listener);
    info!(address = %address, "gRPC server listening");

    let graceful = CancellationToken::new();
    let routes = handles.routes.clone();
    let signal = graceful.clone().cancelled_owned();
    let (incoming, accept_failure) = listener.into_incoming();
    let serve = async move {
        Server::builder()
            .layer(RequestLoggingLayer)
            .add_routes(routes)
            .serve_with_incoming_shutdown(incoming, signal)
            .await?;
        // The server also returns once the incoming stream ends on a failed
        // listener.
        match accept_failure.take() {
            Some(source) => Err(ServeError::Accept { address, source }),
            None => Ok(()),
        }
    };

    serve_with_context(ctx, serve, |task| async move {
        info!("Shutting down gRPC server");
        graceful.cancel();
        task.await?
    })
    .await
}

async fn serve_http(
    ctx: &CancellationToken,
    handles: Arc<Handles>,
    listener: Listener,
) -> Result<(), ServeError> {
    info!(address = %display_addr(&listener), "HTTP server listening");

    let graceful = CancellationToken::new();
    let serve = http_server::serve(listener, handles.mux.router(), handles.http, graceful.clone());

    serve_with_context(ctx, serve, |task| async move {
        info!("Shutting down HTTP server");
        graceful.cancel();
        task.await?
    })
    .await
}

fn display_addr(listener: &Listener) -> String {
    listener
        .local_addr()
        .unwrap_or_else(|e| format!("<unknown: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;

    fn config() -> Config {
        Config::default().with_grpc(ListenerConfig::tcp("127.0.0.1:1"))
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let mut app = ApplicationServer::new(config());
        assert!(!app.is_initialized());
        app.init().await.unwrap();
        assert!(app.is_initialized());

        let err = app.init().await.unwrap_err();
        assert!(matches!(
            err,
            InitError::Lifecycle(LifecycleError::AlreadyInitialized)
        ));
        assert_eq!(err.to_string(), "application is already initialized");
        assert!(app.is_initialized());
    }

    #[tokio::test]
    async fn test_serve_before_init_fails() {
        let app = ApplicationServer::new(config());
        let ctx = CancellationToken::new();
        let grpc = Listener::bind(&ListenerConfig::tcp("127.0.0.1:0")).await.unwrap();
        let http = Listener::bind(&ListenerConfig::tcp("127.0.0.1:0")).await.unwrap();

        let err = app.serve(&ctx, grpc, http).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Lifecycle(LifecycleError::NotInitialized)
        ));
        assert_eq!(err.to_string(), "application is not initialized");
        assert!(matches!(app.gateway(), Err(LifecycleError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_failed_init_leaves_server_unusable() {
        let bad = Config::default().with_grpc(ListenerConfig::tcp("not a valid address"));
        let mut app = ApplicationServer::new(bad);

        let err = app.init().await.unwrap_err();
        assert!(matches!(err, InitError::Endpoint { .. }));
        assert!(!app.is_initialized());

        assert!(matches!(
            app.init().await,
            Err(InitError::Lifecycle(LifecycleError::InitializationFailed))
        ));
        let ctx = CancellationToken::new();
        let grpc = Listener::bind(&ListenerConfig::tcp("127.0.0.1:0")).await.unwrap();
        assert!(matches!(
            app.serve_grpc(&ctx, grpc).await,
            Err(ServeError::Lifecycle(LifecycleError::InitializationFailed))
        ));
    }

    #[tokio::test]
    async fn test_empty_registry_still_initializes() {
        let mut app = ApplicationServer::with_registry(config(), ServiceRegistry::new());
        app.init().await.unwrap();
        assert!(app.gateway().is_ok());
    }
}
