//! Tether SDK - Lightweight SDK for writing managed assemblies
//!
//! This crate provides the minimal types and traits needed to author the
//! managed side of a Tether bridge without depending on the bridge itself:
//! the value model, conversion traits, and the reflection-style type catalog
//! the bridge resolves members from.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{declare_assembly, Assembly, TypeBuilder};
//!
//! #[derive(Default)]
//! struct Adder;
//!
//! fn build() -> Assembly {
//!     let mut assembly = Assembly::new("Game", "1.0.0");
//!     assembly.add_type(
//!         TypeBuilder::<Adder>::new("Game.Adder")
//!             .default_constructor()
//!             .method2("Add", |_this, a: i32, b: i32| a + b)
//!             .build(),
//!     );
//!     assembly
//! }
//!
//! declare_assembly!(build);
//! ```

#![warn(missing_docs)]

pub mod assembly;
pub mod convert;
pub mod error;
pub mod value;

pub use assembly::{
    Assembly, Constructor, ManagedObject, MethodDef, MethodThunk, TypeBuilder, TypeDef, TypeKind,
    ASSEMBLY_CLEANUP_SYMBOL, ASSEMBLY_INIT_SYMBOL,
};
pub use convert::{struct_from_value, struct_to_value, Blittable, ManagedValue};
pub use error::{ManagedError, SdkResult};
pub use value::{StructLayout, StructValue, Value, ValueType};
