// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Per-call logging for the RPC server.
//!
//! Every call is logged at debug level once the handler has returned. A call
//! that failed gets a second line whose level depends on the status code:
//! `Internal` and `Unknown` point at a server bug and are logged as errors,
//! every other code is an expected outcome and stays at debug. The streaming
//! reflection service is passed through unlogged.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tonic::{Code, Status};
use tower::{Layer, Service};
use tracing::{debug, error};

/// Path prefix of the server reflection services.
const REFLECTION_PREFIX: &str = "/grpc.reflection.";

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// How loudly a failed call is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Debug,
}

impl Severity {
    pub fn of(code: Code) -> Self {
        match code {
            Code::Internal | Code::Unknown => Severity::Error,
            Code::Ok
            | Code::Cancelled
            | Code::InvalidArgument
            | Code::DeadlineExceeded
            | Code::NotFound
            | Code::AlreadyExists
            | Code::PermissionDenied
            | Code::ResourceExhausted
            | Code::FailedPrecondition
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unimplemented
            | Code::Unavailable
            | Code::DataLoss
            | Code::Unauthenticated => Severity::Debug,
        }
    }
}

/// Wraps the RPC router with [`RequestLogging`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggingLayer;

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLogging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogging { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLogging<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for RequestLogging<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let method = req.uri().path().to_string();
        let call = self.inner.call(req);
        if method.starts_with(REFLECTION_PREFIX) {
            return Box::pin(call);
        }

        Box::pin(async move {
            let result = call.await;
            debug!(method = %method, "rpc call");

            match &result {
                // Failed unary calls carry their status in the headers.
                Ok(response) => {
                    if let Some(status) = Status::from_header_map(response.headers())
                        && status.code() != Code::Ok
                    {
                        log_rpc_error(&method, &status);
                    }
                }
                Err(e) => error!(method = %method, error = %e, "rpc error"),
            }

            result
        })
    }
}

fn log_rpc_error(method: &str, status: &Status) {
    let code = status.code();
    match Severity::of(code) {
        Severity::Error => error!(
            method = %method,
            code = ?code,
            error = %status.message(),
            "rpc error"
        ),
        Severity::Debug => debug!(
            method = %method,
            code = ?code,
            error = %status.message(),
            "rpc error"
        ),
    }
}
