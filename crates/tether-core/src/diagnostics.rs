//! Diagnostic side channel
//!
//! Failures never carry detail across the boundary; they are reported here
//! instead. Every report becomes a `tracing` event and, when the caller
//! supplied one at initialization, a call to the log callback.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::error::BridgeError;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum LogLevel {
    /// Very fine-grained detail
    Trace = 0,
    /// Lifecycle events
    Debug = 1,
    /// Notable events
    Info = 2,
    /// Recoverable failures
    Warn = 3,
    /// Fatal failures
    Error = 4,
}

impl LogLevel {
    /// Convert from the integer carried by the C log callback
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(LogLevel::Trace),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Integer carried by the C log callback
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Caller-supplied sink for diagnostic messages
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Reports bridge events to `tracing` and the optional caller callback
#[derive(Clone, Default)]
pub struct Diagnostics {
    source: String,
    callback: Option<LogCallback>,
}

impl Diagnostics {
    /// Create a channel tagged with the bridge name
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            callback: None,
        }
    }

    /// Install or clear the caller callback
    pub fn set_callback(&mut self, callback: Option<LogCallback>) {
        self.callback = callback;
    }

    /// Check if a caller callback is installed
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Emit a message
    pub fn log(&self, level: LogLevel, message: &str) {
        let source = self.source.as_str();
        match level {
            LogLevel::Trace => trace!(source, "{}", message),
            LogLevel::Debug => debug!(source, "{}", message),
            LogLevel::Info => info!(source, "{}", message),
            LogLevel::Warn => warn!(source, "{}", message),
            LogLevel::Error => error!(source, "{}", message),
        }
        self.forward(level, message);
    }

    /// Report a failed operation
    pub fn report(&self, operation: &str, err: &BridgeError) {
        warn!(
            source = self.source.as_str(),
            operation,
            class = ?err.class(),
            "{}",
            err
        );
        self.forward(LogLevel::Warn, &format!("{}: {}", operation, err));
    }

    fn forward(&self, level: LogLevel, message: &str) {
        if let Some(callback) = &self.callback {
            callback(level, message);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("source", &self.source)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
