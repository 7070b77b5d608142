//! Bridge error types
//!
//! Every failure inside the bridge is a [`BridgeError`]. Callers on the far
//! side of the boundary never see these values: the host collapses them to
//! the `0`/`false` sentinel after reporting them through [`Diagnostics`].
//!
//! [`Diagnostics`]: crate::diagnostics::Diagnostics

use std::any::Any;

use tether_sdk::ManagedError;
use thiserror::Error;

use crate::binding::MethodId;
use crate::bridge::BridgeState;
use crate::instance::InstanceKey;
use crate::signature::SignatureId;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Coarse failure category, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unknown type, member, or signature, or a signature mismatch
    Resolution,
    /// Operating on something destroyed, never created, or in the wrong state
    Lifecycle,
    /// Argument count, buffer, or layout problems
    Shape,
    /// The managed member failed while running
    Execution,
}

/// Errors that can occur in bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Type name could not be parsed
    #[error("Invalid type name: {0:?}")]
    InvalidTypeName(String),

    /// No loaded assembly exports the type
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// Type exists but cannot occupy a parameter or return slot
    #[error("Type {0} cannot be marshaled")]
    UnsupportedType(String),

    /// `void` used as a parameter type
    #[error("Parameter {index} of signature {id} is void")]
    VoidParameter {
        /// Signature id
        id: SignatureId,
        /// Parameter position
        index: usize,
    },

    /// Type exists but cannot be default-constructed
    #[error("Type {0} has no default constructor")]
    NoDefaultConstructor(String),

    /// Signature ids must be non-negative
    #[error("Invalid signature id: {0}")]
    InvalidSignatureId(SignatureId),

    /// Signature id was never registered
    #[error("Signature not registered: {0}")]
    UnknownSignature(SignatureId),

    /// Signature id already registered with a different shape
    #[error("Signature {0} already registered with a different shape")]
    IncompatibleSignature(SignatureId),

    /// No member matches the name and signature
    #[error("Method not found: {type_name}.{method}({params}) -> {ret}")]
    MethodNotFound {
        /// Type searched
        type_name: String,
        /// Method name
        method: String,
        /// Rendered parameter list
        params: String,
        /// Rendered return type
        ret: String,
    },

    /// Assembly with the same name is already loaded
    #[error("Assembly already loaded: {0}")]
    AssemblyAlreadyLoaded(String),

    /// Instance handle or key not live
    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceKey),

    /// Caller-chosen key already in use
    #[error("Instance key already in use: {0:?}")]
    DuplicateKey(String),

    /// Caller-chosen key is empty
    #[error("Instance key must not be empty")]
    EmptyKey,

    /// No more instance handles can be minted
    #[error("Instance handles exhausted")]
    HandlesExhausted,

    /// No more method ids can be minted
    #[error("Method ids exhausted")]
    MethodIdsExhausted,

    /// Method id not bound, or invalidated by instance destruction
    #[error("Method id not bound: {0}")]
    UnknownMethod(MethodId),

    /// Operation attempted in the wrong lifecycle state
    #[error("{operation} is not valid while {state:?}")]
    InvalidState {
        /// Operation name
        operation: &'static str,
        /// Current state
        state: BridgeState,
    },

    /// Argument count does not equal the bound arity
    #[error("Argument count mismatch: expected {expected}, got {got}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: i64,
    },

    /// Argument array pointer is null while arguments are expected
    #[error("Argument array is null")]
    NullArgumentArray,

    /// An argument pointer is null
    #[error("Argument {0} is null")]
    NullArgument(usize),

    /// An argument pointer is not aligned for its parameter type
    #[error("Argument {index} is not aligned to {align} bytes")]
    MisalignedArgument {
        /// Parameter position
        index: usize,
        /// Required alignment
        align: usize,
    },

    /// Non-void return without a return buffer
    #[error("Return buffer required for {0} return")]
    MissingReturnBuffer(String),

    /// Return buffer is not aligned for the return type
    #[error("Return buffer is not aligned to {0} bytes")]
    MisalignedReturn(usize),

    /// Owned argument does not match its parameter type
    #[error("Argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        /// Parameter position
        index: usize,
        /// Declared type
        expected: String,
        /// Supplied type
        got: String,
    },

    /// The managed member threw or panicked
    #[error("Managed failure in {method}: {source}")]
    Managed {
        /// `Type.Method` that failed
        method: String,
        /// Managed-side error
        #[source]
        source: ManagedError,
    },

    /// The managed member returned a value of the wrong type
    #[error("{method} returned {got}, declared {expected}")]
    ReturnType {
        /// `Type.Method` that returned
        method: String,
        /// Declared return type
        expected: String,
        /// Returned value type
        got: String,
    },
}

impl BridgeError {
    /// Failure category of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::InvalidTypeName(_)
            | BridgeError::TypeNotFound(_)
            | BridgeError::UnsupportedType(_)
            | BridgeError::VoidParameter { .. }
            | BridgeError::NoDefaultConstructor(_)
            | BridgeError::InvalidSignatureId(_)
            | BridgeError::UnknownSignature(_)
            | BridgeError::IncompatibleSignature(_)
            | BridgeError::MethodNotFound { .. } => ErrorClass::Resolution,

            BridgeError::AssemblyAlreadyLoaded(_)
            | BridgeError::InstanceNotFound(_)
            | BridgeError::DuplicateKey(_)
            | BridgeError::EmptyKey
            | BridgeError::HandlesExhausted
            | BridgeError::MethodIdsExhausted
            | BridgeError::UnknownMethod(_)
            | BridgeError::InvalidState { .. } => ErrorClass::Lifecycle,

            BridgeError::ArityMismatch { .. }
            | BridgeError::NullArgumentArray
            | BridgeError::NullArgument(_)
            | BridgeError::MisalignedArgument { .. }
            | BridgeError::MissingReturnBuffer(_)
            | BridgeError::MisalignedReturn(_)
            | BridgeError::ArgumentType { .. } => ErrorClass::Shape,

            BridgeError::Managed { .. } | BridgeError::ReturnType { .. } => ErrorClass::Execution,
        }
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
