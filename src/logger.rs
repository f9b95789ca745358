use std::fmt;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sink for connection lifecycle messages.
pub trait Logger: Send + Sync {
    fn info(&self, args: fmt::Arguments<'_>);
    fn warn(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Default logger, forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "bridge_storage", "{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "bridge_storage", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "bridge_storage", "{}", args);
    }
}

pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

/// Installs a formatting subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error if a subscriber is already installed (tests, embedding apps).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
