// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Service Registry
//! The set of service implementations the application server exposes.

use std::fmt;
use std::sync::Arc;

use tonic::service::RoutesBuilder;
use tonic::transport::Channel;

use crate::error::InitError;
use crate::gateway::ServeMuxBuilder;
use crate::ping::Ping;

/// A service exposed over both transports.
pub trait RegisteredService: Send + Sync {
    /// Fully qualified gRPC service name.
    fn name(&self) -> &'static str;

    /// Adds the service implementation to the gRPC routes.
    fn register_rpc(&self, routes: &mut RoutesBuilder);

    /// Adds the HTTP bindings of the service. Handlers call the service through
    /// `channel`, which dials the local gRPC server.
    fn register_gateway(
        &self,
        mux: &mut ServeMuxBuilder,
        channel: Channel,
    ) -> Result<(), InitError>;
}

/// Registry of services, built once and read-only afterwards.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn RegisteredService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The services shipped with the application.
    pub fn default_services() -> Self {
        Self::new().with(Arc::new(Ping))
    }

    pub fn with(mut self, service: Arc<dyn RegisteredService>) -> Self {
        self.services.push(service);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.services.iter().map(|service| service.name()).collect()
    }

    pub fn register_rpc(&self, routes: &mut RoutesBuilder) {
        for service in &self.services {
            service.register_rpc(routes);
        }
    }

    pub fn register_gateway(
        &self,
        mux: &mut ServeMuxBuilder,
        channel: &Channel,
    ) -> Result<(), InitError> {
        for service in &self.services {
            service.register_gateway(mux, channel.clone())?;
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
