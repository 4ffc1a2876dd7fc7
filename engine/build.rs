// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);
    tonic_prost_build::configure()
        .file_descriptor_set_path(out_dir.join("gw_descriptor.bin"))
        // Gateway JSON uses lowerCamelCase names and accepts partial messages.
        .type_attribute(
            ".example.v1",
            "#[derive(serde::Serialize, serde::Deserialize)]\n#[serde(rename_all = \"camelCase\", default)]",
        )
        .compile_protos(&["proto/example/v1/ping.proto"], &["proto"])?;
    Ok(())
}
