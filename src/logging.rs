//! Logging for the binding cache
//!
//! Uses `tracing` for structured logging. Embedders that already install a
//! subscriber get the events for free; everyone else can call `init_logging`
//! once at startup.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

// Keeps the writer thread of the library-owned subscriber alive
static WORKER_GUARD: Mutex<Option<WorkerGuard>> = parking_lot::const_mutex(None);

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Extra filter directives (e.g. "pygch=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `PYGCH_LOG_*` variables on top of this configuration
    pub fn with_env_overrides(self) -> Self {
        let mut config = self;

        // PYGCH_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("PYGCH_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        // PYGCH_LOG_FORMAT: pretty, compact, json
        if let Ok(format) = std::env::var("PYGCH_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }

        // PYGCH_LOG_FILE: directory for rotated log files
        if let Ok(directory) = std::env::var("PYGCH_LOG_FILE") {
            config.output = LogOutput::File {
                directory,
                prefix: "pygch".to_string(),
            };
        }

        if std::env::var("PYGCH_LOG_SPANS").is_ok() {
            config.span_events = true;
        }

        config
    }
}

/// Parse a level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the global logging system
///
/// Only the first call installs a subscriber. The returned guard must be kept
/// alive so buffered events are flushed; later calls return `None`.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = build_filter(&config);
        let (writer, worker) = match &config.output {
            LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File { directory, prefix } => {
                tracing_appender::non_blocking(rolling::daily(directory, prefix))
            }
        };
        guard = Some(worker);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_span_events(span_events_config(config.span_events));

        let layer = match config.format {
            LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
            LogFormat::Compact => layer.compact().with_filter(filter).boxed(),
            LogFormat::Json => layer.json().with_filter(filter).boxed(),
        };

        // Another subscriber may already be installed by the embedder
        tracing_subscriber::registry().with(layer).try_init().ok();
    });

    guard
}

/// Initialize logging from `PYGCH_LOG_*` environment variables
pub fn init() -> Option<WorkerGuard> {
    init_logging(LogConfig::from_env())
}

/// Initialize logging and keep the writer guard for the life of the process
///
/// Used by the entry points loaded into a host process, where no caller is
/// around to hold the guard.
pub fn init_retained(config: LogConfig) {
    if let Some(guard) = init_logging(config) {
        *WORKER_GUARD.lock() = Some(guard);
    }
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env()
        .add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => {
            filter_str.split(',')
                .fold(base_filter, |filter, directive| {
                    filter.add_directive(directive.parse().unwrap_or_else(|_| {
                        tracing::warn!("Invalid filter directive: {}", directive);
                        config.level.into()
                    }))
                })
        }
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Log a member or module resolution against the host
#[inline]
pub fn log_resolution(name: &str, success: bool) {
    if success {
        debug!(target: "pygch::cache", name, "binding resolved");
    } else {
        warn!(target: "pygch::cache", name, "binding resolution failed");
    }
}

/// Log a cache hit that skipped the host round trip
#[inline]
pub fn log_cache_hit(name: &str) {
    trace!(target: "pygch::cache", name, "binding cache hit");
}

/// Log a host call made through a cached binding
#[inline]
pub fn log_host_call(name: &str, args: &str, success: bool) {
    trace!(target: "pygch::host", function = name, args, success, "host call");
}

/// Log an error discarded by the guard in front of `collect`
#[inline]
pub fn log_discarded_error(error: Option<crate::host::HostError>) {
    if let Some(error) = error {
        debug!(target: "pygch::host", error = %error, "pending host error cleared before collect");
    }
}

/// Log a cache invalidation
#[inline]
pub fn log_invalidation(handles_dropped: usize, flags_dropped: usize) {
    info!(
        target: "pygch::cache",
        handles_dropped,
        flags_dropped,
        "binding cache invalidated"
    );
}

/// Log the outcome of the guarded runtime teardown
#[inline]
pub fn log_teardown(status: i32) {
    if status < 0 {
        error!(target: "pygch::runtime", status, "runtime teardown reported failure");
    } else {
        info!(target: "pygch::runtime", status, "runtime torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_filter("pygch=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
        assert_eq!(config.filter, Some("pygch=trace".to_string()));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_init_idempotent() {
        let _guard = init_logging(LogConfig::new().with_level(Level::DEBUG));
        assert!(init_logging(LogConfig::new()).is_none());
        assert!(is_initialized());
    }

    #[test]
    fn test_init_retained() {
        init_retained(LogConfig::new());
        init_retained(LogConfig::new().with_level(Level::TRACE));
        assert!(is_initialized());
    }

    #[test]
    fn test_env_overrides_keep_unset_fields() {
        if std::env::var("PYGCH_LOG_FORMAT").is_ok() {
            return;
        }

        let merged = LogConfig::new()
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_env_overrides();
        assert_eq!(merged.format, LogFormat::Json);
        assert!(merged.span_events);
    }

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_resolution("enable", true);
        log_resolution("collect", false);
        log_cache_hit("isenabled");
        log_host_call("collect", "()", true);
        log_discarded_error(Some(crate::host::HostError::new("KeyError", "stale")));
        log_discarded_error(None);
        log_invalidation(7, 5);
        log_teardown(0);
        log_teardown(-1);
    }
}
