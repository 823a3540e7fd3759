// SPDX-License-Identifier: Apache-2.0

//! Process-wide logging setup for harness binaries.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `verbose` lowers the default level to `debug`; either way the
/// `RUST_LOG` environment variable wins. Calling this twice is harmless:
/// the second install attempt is ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
