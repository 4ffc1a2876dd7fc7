// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Ping service
//! Liveness check answering "Pong" over gRPC and the HTTP gateway.

use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use http::Method;
use tonic::service::RoutesBuilder;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;

use crate::error::InitError;
use crate::gateway::{
    ForwardedMetadata, JsonMessage, PathParams, QueryMessage, ServeMuxBuilder, forward_unary,
};
use crate::proto::example::v1::ping_service_client::PingServiceClient;
use crate::proto::example::v1::ping_service_server::{PingService, PingServiceServer, SERVICE_NAME};
use crate::proto::example::v1::{PingRequest, PingResponse};
use crate::registry::RegisteredService;

pub const PONG: &str = "Pong";

/// gRPC implementation of `example.v1.PingService`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingServer;

#[tonic::async_trait]
impl PingService for PingServer {
    async fn ping(
        &self,
        request: Request<PingRequest>,
    ) -> Result<tonic::Response<PingResponse>, Status> {
        let target = request.into_inner().target;
        debug!(target = %target, "Ping received");
        Ok(tonic::Response::new(PingResponse {
            message: PONG.to_string(),
            target,
        }))
    }
}

/// Registry entry wiring the ping service into both transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ping;

impl RegisteredService for Ping {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn register_rpc(&self, routes: &mut RoutesBuilder) {
        routes.add_service(PingServiceServer::new(PingServer));
    }

    fn register_gateway(
        &self,
        mux: &mut ServeMuxBuilder,
        channel: Channel,
    ) -> Result<(), InitError> {
        let client = PingServiceClient::new(channel);
        mux.handle(
            SERVICE_NAME,
            Method::GET,
            "/v1/ping",
            get(ping_from_query).with_state(client.clone()),
        )?
        .handle(
            SERVICE_NAME,
            Method::GET,
            "/v1/ping/{target}",
            get(ping_from_path).with_state(client.clone()),
        )?
        .handle(
            SERVICE_NAME,
            Method::POST,
            "/v1/ping",
            post(ping_from_body).with_state(client),
        )?;
        Ok(())
    }
}

type Client = PingServiceClient<Channel>;

async fn ping_from_query(
    State(mut client): State<Client>,
    metadata: ForwardedMetadata,
    QueryMessage(message): QueryMessage<PingRequest>,
) -> Response {
    forward_unary(metadata, message, |request| async move { client.ping(request).await }).await
}

async fn ping_from_path(
    State(mut client): State<Client>,
    metadata: ForwardedMetadata,
    params: PathParams,
    QueryMessage(mut message): QueryMessage<PingRequest>,
) -> Response {
    // Path parameters take precedence over the query string.
    if let Some(target) = params.get("target") {
        message.target = target.to_string();
    }
    forward_unary(metadata, message, |request| async move { client.ping(request).await }).await
}

async fn ping_from_body(
    State(mut client): State<Client>,
    metadata: ForwardedMetadata,
    JsonMessage(message): JsonMessage<PingRequest>,
) -> Response {
    forward_unary(metadata, message, |request| async move { client.ping(request).await }).await
}
