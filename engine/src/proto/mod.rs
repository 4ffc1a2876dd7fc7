// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Protobuf messages and gRPC stubs generated from `proto/` at build time.

#![allow(clippy::all)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod example {
    pub mod v1 {
        tonic::include_proto!("example.v1");
    }
}

/// Encoded descriptors of every compiled file and its imports, for server
/// reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("gw_descriptor");
