// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane-id path-segment codec (spec.md §6 "Pane encoding").
//!
//! Pane ids may themselves contain `%`, which would otherwise be
//! misinterpreted as the start of a percent-escape once the id is embedded
//! in a URL path. Doubling `%` to `%25` before percent-encoding the rest of
//! the segment makes the round trip lossless.

const ESCAPED_PERCENT: &str = "%25";

/// Encode a raw pane id for embedding in a URL path segment.
pub fn encode_path_segment(pane_id: &str) -> String {
    let doubled = pane_id.replace('%', ESCAPED_PERCENT);
    percent_encoding::utf8_percent_encode(&doubled, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Decode a URL path segment back into a raw pane id.
pub fn decode_path_segment(segment: &str) -> String {
    let unescaped =
        percent_encoding::percent_decode_str(segment).decode_utf8_lossy().into_owned();
    unescaped.replace(ESCAPED_PERCENT, "%")
}

#[cfg(test)]
#[path = "pane_id_tests.rs"]
mod tests;
