// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Structured JSON logging
//!
//! Log lines are written as one JSON object per line. The RPC stack (tonic,
//! h2, hyper, tower) emits its own diagnostics through `tracing` as well; those
//! pass through a runtime switch so the application server can mute them once
//! it has taken over request logging.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Metadata, Subscriber};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing_subscriber::filter::DynFilterFn;
use tracing_subscriber::layer::{Filter, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry};

static RPC_LIBRARY_LOGS_ENABLED: AtomicBool = AtomicBool::new(true);

const RPC_LIBRARY_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "tonic", "tower"];

/// Parses an operator-supplied level name.
///
/// Unknown names fall back to `info` and return a warning message for the
/// caller to log once the subscriber is installed.
pub fn parse_level(level: &str) -> (LevelFilter, Option<String>) {
    let parsed = match level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "fatal" | "panic" => LevelFilter::ERROR,
        _ => {
            return (
                LevelFilter::INFO,
                Some(format!(
                    "error parsing log level {level:?}; defaulting to info"
                )),
            );
        }
    };
    (parsed, None)
}

/// Installs the global JSON subscriber at the given level.
pub fn init(level: LevelFilter) -> Result<(), TryInitError> {
    Registry::default().with(json_layer(level)).try_init()
}

/// Builds the JSON formatting layer with the level and RPC library filters
/// applied. Exposed so tests can install it as a scoped default subscriber.
pub fn json_layer<S>(level: LevelFilter) -> impl Layer<S> + Send + Sync + 'static
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .with_filter(level)
        .with_filter(rpc_library_filter())
}

/// Same as [`json_layer`] but writing to the given writer.
pub fn json_layer_with_writer<S, W>(
    level: LevelFilter,
    writer: W,
) -> impl Layer<S> + Send + Sync + 'static
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(writer)
        .with_filter(level)
        .with_filter(rpc_library_filter())
}

/// Mutes diagnostics emitted by the RPC stack itself. Application logs,
/// including the request logger, are unaffected.
pub fn silence_rpc_library_logs() {
    RPC_LIBRARY_LOGS_ENABLED.store(false, Ordering::Release);
}

pub fn rpc_library_logs_enabled() -> bool {
    RPC_LIBRARY_LOGS_ENABLED.load(Ordering::Acquire)
}

fn rpc_library_filter<S>() -> impl Filter<S> + Send + Sync + 'static
where
    S: Subscriber,
{
    // The switch can flip after callsites registered, so interest is never cached.
    DynFilterFn::new(|meta: &Metadata<'_>, _| {
        rpc_library_logs_enabled() || !is_rpc_library_target(meta.target())
    })
    .with_callsite_filter(|_| Interest::sometimes())
}

fn is_rpc_library_target(target: &str) -> bool {
    RPC_LIBRARY_TARGETS.iter().any(|lib| {
        target
            .strip_prefix(lib)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}
