//! Tracing/logging setup shared by the flowpay binaries.

pub mod tracing;

pub use self::tracing::{DEFAULT_DIRECTIVES, LogFormat};

/// Initialize process-wide tracing/logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}
