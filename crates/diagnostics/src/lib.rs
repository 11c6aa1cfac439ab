//! Lightweight, configurable logging shared by all crates in the workspace.
//!
//! Usage:
//! - Set GEOBIND_LOG=off (default) - no logs
//! - Set GEOBIND_LOG=info - basic operation logs
//! - Set GEOBIND_LOG=debug - detailed diagnostic logs

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the GEOBIND_LOG environment variable.
///
/// This should be called once at application startup. It's safe to call
/// multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var("GEOBIND_LOG").unwrap_or_else(|_| "off".to_string());

        let min_level = match log_level.as_str() {
            "off" => return, // No setup needed
            "debug" => emit::Level::Debug,
            "info" => emit::Level::Info,
            "warn" => emit::Level::Warn,
            "error" => emit::Level::Error,
            _ => {
                eprintln!(
                    "Warning: Unknown GEOBIND_LOG value '{}', using 'info'",
                    log_level
                );
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min_level))
            .init();

        // Keep the emitter alive for the life of the process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (table downloads, registry resolution, object saves).
///
/// Use this for operations that users might want to see in normal usage.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (cell counts, resolved paths, internal state).
///
/// Use this for detailed information useful for debugging and performance analysis.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (fallbacks, legacy records, recoverable issues).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log critical error conditions (failed uploads, unresolvable schemas).
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
