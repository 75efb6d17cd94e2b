//! Process-wide logging setup shared by Userverse binaries and tests.

/// Tracing subscriber configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize JSON logging, filtered by `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Same as [`init`] with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
