//! Tracing and logging setup shared by every GridCast binary.

/// Initialize process-wide logging with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize process-wide logging with the given output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

pub mod format;

/// Subscriber installation (filters, formatters).
pub mod tracing;

pub use format::{LogFormat, ParseLogFormatError};
