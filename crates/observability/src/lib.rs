//! Process-wide tracing setup for stock ledger binaries and tests.

pub mod subscriber;

pub use subscriber::{LogFormat, init_with};

/// Initialize tracing with the defaults (`RUST_LOG`, else `info`; JSON output).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with(subscriber::DEFAULT_FILTER, LogFormat::from_env());
}
