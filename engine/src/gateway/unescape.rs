// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Percent-decoding of path parameters.

use thiserror::Error;

/// Which percent-encoded characters in a path parameter are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnescapingMode {
    /// Decode everything except RFC 6570 reserved characters. An escaped
    /// slash (`%2F`) therefore survives into the parameter value.
    #[default]
    AllExceptReserved,
    /// Decode everything except `%2F`.
    AllExceptSlash,
    /// Decode every escape sequence.
    AllCharacters,
}

/// RFC 6570 section 1.5 reserved set.
const RESERVED: &[u8] = b":/?#[]@!$&'()*+,;=";

impl UnescapingMode {
    fn keeps_encoded(self, byte: u8) -> bool {
        match self {
            UnescapingMode::AllExceptReserved => RESERVED.contains(&byte),
            UnescapingMode::AllExceptSlash => byte == b'/',
            UnescapingMode::AllCharacters => false,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnescapeError {
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),
    #[error("path parameter is not valid UTF-8 once unescaped")]
    InvalidUtf8,
}

/// Decodes `input` according to `mode`.
///
/// Escapes that `mode` keeps encoded are copied verbatim, including the case
/// of their hex digits.
pub fn unescape(input: &str, mode: UnescapingMode) -> Result<String, UnescapeError> {
    if !input.contains('%') {
        return Ok(input.to_string());
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let escape = bytes.get(i..i + 3).ok_or_else(|| {
            UnescapeError::InvalidEscape(String::from_utf8_lossy(&bytes[i..]).into_owned())
        })?;
        let decoded = match (hex_value(escape[1]), hex_value(escape[2])) {
            (Some(hi), Some(lo)) => (hi << 4) | lo,
            _ => {
                return Err(UnescapeError::InvalidEscape(
                    String::from_utf8_lossy(escape).into_owned(),
                ));
            }
        };

        if mode.keeps_encoded(decoded) {
            out.extend_from_slice(escape);
        } else {
            out.push(decoded);
        }
        i += 3;
    }

    String::from_utf8(out).map_err(|_| UnescapeError::InvalidUtf8)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
