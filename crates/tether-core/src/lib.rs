//! Tether Core - Registries and calling convention for the invocation bridge
//!
//! This crate provides the bridge between a caller and managed assemblies:
//! - Signature registry (integer id -> resolved parameter/return types)
//! - Instance registry (integer handles and caller-chosen keys)
//! - Method binding table (cached, idempotent member resolution)
//! - Invocation dispatcher (owned values or raw argument pointers)
//! - Diagnostic side channel (`tracing` plus an optional caller callback)
//!
//! # Example
//!
//! ```ignore
//! use tether_core::{Bridge, BridgeOptions};
//! use tether_sdk::Value;
//!
//! let mut bridge = Bridge::new(BridgeOptions::default());
//! bridge.initialize(None)?;
//! bridge.load_assembly(game_assembly())?;
//! bridge.register_signature(10, "int", &["int", "int"])?;
//!
//! let adder = bridge.create_instance("Adder")?;
//! let add = bridge.bind_instance_method(adder, "Add", 10)?;
//! assert_eq!(bridge.call::<i32>(add, &[Value::I32(2), Value::I32(3)])?, 5);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod binding;
pub mod bridge;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod instance;
pub mod marshal;
pub mod runtime;
pub mod signature;
pub mod types;

pub use binding::{BindingTable, MethodBinding, MethodId, MethodTarget, INVALID_METHOD};
pub use bridge::{Bridge, BridgeOptions, BridgeState};
pub use diagnostics::{Diagnostics, LogCallback, LogLevel};
pub use error::{BridgeError, BridgeResult, ErrorClass};
pub use instance::{InstanceHandle, InstanceKey, InstanceRegistry, INVALID_HANDLE};
pub use marshal::LayoutCheck;
pub use runtime::{AssemblyDomain, CreatedObject, ManagedRuntime, ResolvedMethod};
pub use signature::{Signature, SignatureId, SignatureRegistry};
pub use types::TypeName;
