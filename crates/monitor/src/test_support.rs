// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test-only helpers. Grounded on `coopmux::test_support::AnyhowExt`:
//! tests return `anyhow::Result<()>` and use `?` instead of `unwrap`/`expect`,
//! which the workspace's `clippy::unwrap_used`/`expect_used` lints forbid.

/// Converts any `Result<T, E: Display>` into `anyhow::Result<T>` so test
/// code can use `?` against errors that don't implement `std::error::Error`
/// (e.g. `axum_test`'s client errors).
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Same conversion for `Option<T>`, with a caller-supplied message for the
/// `None` case.
pub trait AnyhowOptExt<T> {
    fn anyhow(self, message: &str) -> anyhow::Result<T>;
}

impl<T> AnyhowOptExt<T> for Option<T> {
    fn anyhow(self, message: &str) -> anyhow::Result<T> {
        self.ok_or_else(|| anyhow::anyhow!("{message}"))
    }
}
