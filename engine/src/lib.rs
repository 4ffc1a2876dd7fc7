// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod listener;
pub mod logging;
pub mod ping;
pub mod proto;
pub mod registry;
pub mod serve;
pub mod server;
pub mod transport;

pub use config::{Config, ListenerConfig, Network};
pub use error::{ConfigError, InitError, LifecycleError, ServeError};
pub use gateway::ServeMux;
pub use listener::Listener;
pub use server::ApplicationServer;
