//! Error types for managed-side code

/// Result type for managed-side operations
pub type SdkResult<T> = Result<T, ManagedError>;

/// Errors raised inside the managed side.
///
/// These never cross the bridge boundary as values. The bridge wraps them
/// and reports them through its diagnostic channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagedError {
    /// Type mismatch during value conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Wrong number of arguments passed to a method thunk
    #[error("Argument count mismatch: expected {expected}, got {got}")]
    ArgumentCount {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Instance method called without a receiver, or with a receiver of the
    /// wrong concrete type
    #[error("Invalid receiver for {0}")]
    InvalidReceiver(String),

    /// The member threw
    #[error("Exception: {0}")]
    Exception(String),

    /// The member panicked
    #[error("Method panicked: {0}")]
    Panic(String),
}

impl From<String> for ManagedError {
    fn from(s: String) -> Self {
        ManagedError::Exception(s)
    }
}

impl From<&str> for ManagedError {
    fn from(s: &str) -> Self {
        ManagedError::Exception(s.to_string())
    }
}
