//! Logging infrastructure - structured tracing for the call boundary
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels via `CALLBRIDGE_LOG_*` or `RUST_LOG`
//! - Zero-cost when disabled
//! - Console or file output, human-readable or JSON
//!
//! Native-call trace records (`[Thread "main" --> JNI: ...]`) are emitted
//! at target `callbridge::jni` so they can be filtered independently.

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::convention::CallingConvention;
use crate::error::LinkError;
use crate::runtime::ManagedException;

/// Target used for native entry/exit trace records
pub const JNI_TARGET: &str = "callbridge::jni";

/// Global logging state; holds the file writer guard so buffered lines are flushed
static LOGGER: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console output when `None`
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // CALLBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("CALLBRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level_str).unwrap_or(Level::INFO);
        }

        if let Ok(path) = std::env::var("CALLBRIDGE_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("CALLBRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("CALLBRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Create high-performance config (minimal logging)
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Create debug config (verbose logging)
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: Some("callbridge.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

/// Parse a level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration (first call wins)
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("callbridge={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match &config.log_path {
            Some(path) => {
                let path = Path::new(path);
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "callbridge.log".to_string());
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard))
            }
            None => (BoxMakeWriter::new(io::stderr), None),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(cfg!(debug_assertions));

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = if config.json_format {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer.compact()).try_init()
        };
        // Another subscriber may already be installed (tests, embedders)
        installed.ok();

        guard
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

// ============================================================================
// Boundary-specific logging functions
// ============================================================================

/// Log a freshly resolved layout
pub fn log_layout_resolved(convention: &CallingConvention, args: usize, overflow_size: usize) {
    use tracing::trace;
    trace!(
        event = "layout_resolved",
        convention = %convention,
        args,
        overflow_size,
        "Call layout resolved"
    );
}

/// Log stub generation
pub fn log_stub_generated(method: &str, lightweight: bool, ops: usize, arg_slots: usize) {
    use tracing::debug;
    debug!(
        event = "stub_generated",
        method,
        lightweight,
        ops,
        arg_slots,
        "Native stub generated"
    );
}

/// Log a successful native symbol binding
pub fn log_symbol_linked(symbol: &str, address: usize) {
    use tracing::debug;
    debug!(
        event = "symbol_linked",
        symbol,
        address = %format!("{:#x}", address),
        "Native symbol linked"
    );
}

/// Log a native symbol that could not be bound
pub fn log_link_failure(method: &str, error: &LinkError) {
    use tracing::error;
    error!(
        event = "link_failure",
        method,
        error = %error,
        "Native symbol resolution failed"
    );
}

/// Trace record written when a thread enters a native method
pub fn log_native_entry(thread: &str, method: &str) {
    use tracing::info;
    info!(target: JNI_TARGET, "[Thread \"{}\" --> JNI: {}]", thread, method);
}

/// Trace record written when a native method returns to its stub
pub fn log_native_exit(thread: &str, method: &str) {
    use tracing::info;
    info!(target: JNI_TARGET, "[Thread \"{}\" <-- JNI: {}]", thread, method);
}

/// Log an exception left pending by native code
pub fn log_pending_exception(thread: &str, exception: &ManagedException) {
    use tracing::debug;
    debug!(
        event = "pending_exception",
        thread,
        exception = %exception,
        "Rethrowing exception raised in native code"
    );
}

/// Log handle stack exhaustion
pub fn log_handle_overflow(thread: &str, limit: usize) {
    use tracing::warn;
    warn!(
        event = "handle_overflow",
        thread,
        limit,
        "Handle stack limit reached"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::trace;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &'static str) -> PerformanceGuard {
        PerformanceGuard {
            operation,
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: &'static str,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            trace!(
                operation = self.operation,
                duration_us = elapsed.as_micros() as u64,
                "operation completed"
            );
        }
    }
}
