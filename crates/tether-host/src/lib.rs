//! Tether Host - Runtime loader and C ABI
//!
//! Boots a [`tether_core::Bridge`] from a `tether.toml`, loads managed
//! assemblies from shared libraries, and exports the bridge to foreign
//! callers as `extern "C"` functions with sentinel error returns.
//!
//! # Configuration
//!
//! ```toml
//! [host]
//! name = "game"
//! assemblies = ["libscripts.so"]
//!
//! [[signatures]]
//! id = 10
//! returns = "int"
//! params = ["int", "int"]
//! ```
//!
//! # Rust embedding
//!
//! ```ignore
//! use tether_host::{Host, HostConfig};
//!
//! let mut host = Host::boot(HostConfig::from_file("tether.toml".as_ref())?, None)?;
//! let adder = host.create_instance("Game.Adder, Scripts");
//! let add = host.bind_instance_method(adder, "Add", 10);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod ffi;
pub mod host;
pub mod loader;

pub use config::{ConfigError, HostConfig, HostSection, LayoutCheckSetting, SignatureConfig};
pub use ffi::{load_static_assembly, TetherLogFn};
pub use host::{Host, HostError};
pub use loader::{Library, LoadError};
