//! Process-wide tracing/logging setup.

pub mod tracing;

/// Initialize logging with the default filter (`info`) and JSON output.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info", true);
}

pub use self::tracing::init as init_with;
