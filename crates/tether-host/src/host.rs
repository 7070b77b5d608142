//! Process-global runtime host
//!
//! [`Host`] boots a [`Bridge`] from a [`HostConfig`], loads assembly
//! libraries, and exposes the bridge operations with the boundary's
//! sentinel convention: failures return `0`/`false` after being reported to
//! the diagnostic channel. Only one host may be alive per process.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tether_core::{
    Bridge, BridgeError, BridgeState, InstanceHandle, LogCallback, LogLevel, MethodId, SignatureId,
    INVALID_HANDLE, INVALID_METHOD,
};
use tether_sdk::Assembly;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, HostConfig};
use crate::loader::{LoadError, Library};

static HOST_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Errors that can occur while booting a host
#[derive(Debug, Error)]
pub enum HostError {
    /// Another host is alive in this process
    #[error("Runtime already initialized")]
    AlreadyInitialized,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An assembly library could not be loaded
    #[error("Failed to load {path}: {source}")]
    Load {
        /// Library path
        path: String,
        /// Loader error
        #[source]
        source: LoadError,
    },

    /// The bridge rejected a boot step
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Releases the process-global slot on drop
#[derive(Debug)]
struct HostSlot;

impl HostSlot {
    fn claim() -> Result<Self, HostError> {
        HOST_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| HostSlot)
            .map_err(|_| HostError::AlreadyInitialized)
    }
}

impl Drop for HostSlot {
    fn drop(&mut self) {
        HOST_ACTIVE.store(false, Ordering::Release);
    }
}

/// Library backing a loaded assembly
#[derive(Debug)]
struct LoadedLibrary {
    assembly: String,
    path: PathBuf,
    library: Library,
}

/// The runtime host
#[derive(Debug)]
pub struct Host {
    bridge: Bridge,
    libraries: Vec<LoadedLibrary>,
    config: HostConfig,
    _slot: HostSlot,
}

impl Host {
    /// Check if a host is alive in this process
    pub fn is_active() -> bool {
        HOST_ACTIVE.load(Ordering::Acquire)
    }

    /// Boot a host.
    ///
    /// Claims the process slot, initializes the bridge, then loads every
    /// configured assembly and registers every configured signature. Any
    /// failure releases the slot and tears down what was loaded.
    pub fn boot(config: HostConfig, log: Option<LogCallback>) -> Result<Self, HostError> {
        let slot = HostSlot::claim()?;

        let mut bridge = Bridge::new(config.bridge_options());
        bridge.initialize(log)?;

        let mut host = Host {
            bridge,
            libraries: Vec::new(),
            config,
            _slot: slot,
        };

        for path in host.config.assembly_paths() {
            host.try_load_file(&path)?;
        }
        for sig in host.config.signatures.clone() {
            host.bridge
                .register_signature(sig.id, &sig.returns, sig.params.as_slice())?;
        }

        info!(
            host = host.config.host.name.as_str(),
            assemblies = host.libraries.len(),
            signatures = host.bridge.signature_count(),
            "Host booted"
        );
        Ok(host)
    }

    /// Boot a host from a configuration file
    pub fn boot_file(path: &Path, log: Option<LogCallback>) -> Result<Self, HostError> {
        if Self::is_active() {
            return Err(HostError::AlreadyInitialized);
        }
        let config = HostConfig::from_file(path)?;
        Self::boot(config, log)
    }

    /// Configuration the host was booted with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The underlying bridge
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Mutable access to the underlying bridge, for `Result`-returning calls
    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    // ========================================================================
    // Assemblies
    // ========================================================================

    fn try_load_file(&mut self, path: &Path) -> Result<(), HostError> {
        let (library, assembly) = open_assembly(path)?;
        let name = assembly.name().to_string();
        self.bridge.load_assembly(assembly)?;
        self.libraries.push(LoadedLibrary {
            assembly: name,
            path: library_key(path),
            library,
        });
        Ok(())
    }

    /// Load an assembly from a shared library
    pub fn load_assembly_file(&mut self, path: &Path) -> bool {
        match self.try_load_file(path) {
            Ok(()) => true,
            Err(err) => self.fail("load_assembly_file", err),
        }
    }

    /// Load an assembly built into the host process
    pub fn load_assembly(&mut self, assembly: Assembly) -> bool {
        self.bridge.load_assembly(assembly).is_ok()
    }

    /// Replace an assembly with the build found at `path`.
    ///
    /// A library already loaded from `path` is unloaded and closed before the
    /// file is opened again, since the platform loader hands back the open
    /// image for a path it still has loaded.
    pub fn reload_assembly_file(&mut self, path: &Path) -> bool {
        match self.try_reload_file(path) {
            Ok(()) => true,
            Err(err) => self.fail("reload_assembly_file", err),
        }
    }

    fn try_reload_file(&mut self, path: &Path) -> Result<(), HostError> {
        let key = library_key(path);
        if let Some(idx) = self.libraries.iter().position(|l| l.path == key) {
            let unloaded = self.bridge.unload_assembly(&self.libraries[idx].assembly)?;
            drop(unloaded);
            let closed = self.libraries.remove(idx);
            debug!(path = %closed.path.display(), "Closed library for reload");
            drop(closed);
            return self.try_load_file(path);
        }

        let (library, assembly) = open_assembly(path)?;
        let name = assembly.name().to_string();
        let previous = self.bridge.reload_assembly(assembly)?;
        drop(previous);
        self.libraries.retain(|l| l.assembly != name);
        self.libraries.push(LoadedLibrary {
            assembly: name,
            path: key,
            library,
        });
        Ok(())
    }

    /// Replace an assembly built into the host process
    pub fn reload_assembly(&mut self, assembly: Assembly) -> bool {
        let name = assembly.name().to_string();
        match self.bridge.reload_assembly(assembly) {
            Ok(previous) => {
                drop(previous);
                self.libraries.retain(|l| l.assembly != name);
                true
            }
            Err(_) => false,
        }
    }

    /// Unload every assembly, then close their libraries
    pub fn unload_assemblies(&mut self) -> bool {
        match self.bridge.unload_assemblies() {
            Ok(unloaded) => {
                drop(unloaded);
                self.libraries.clear();
                true
            }
            Err(_) => false,
        }
    }

    // ========================================================================
    // Sentinel operations
    // ========================================================================

    /// Register a signature
    pub fn register_signature<S: AsRef<str>>(
        &mut self,
        id: SignatureId,
        return_type: &str,
        params: &[S],
    ) -> bool {
        self.bridge
            .register_signature(id, return_type, params)
            .is_ok()
    }

    /// Create an instance, returning its handle or `0`
    pub fn create_instance(&mut self, type_name: &str) -> InstanceHandle {
        self.bridge
            .create_instance(type_name)
            .unwrap_or(INVALID_HANDLE)
    }

    /// Create an instance under a caller key
    pub fn create_instance_guid(&mut self, type_name: &str, key: &str) -> bool {
        self.bridge.create_instance_named(type_name, key).is_ok()
    }

    /// Destroy an instance. Unknown handles are only reported.
    pub fn destroy_instance(&mut self, handle: InstanceHandle) {
        let _ = self.bridge.destroy_instance(handle);
    }

    /// Destroy a named instance. Unknown keys are only reported.
    pub fn destroy_instance_guid(&mut self, key: &str) {
        let _ = self.bridge.destroy_instance_named(key);
    }

    /// Bind an instance method, returning its id or `0`
    pub fn bind_instance_method(
        &mut self,
        handle: InstanceHandle,
        method: &str,
        signature: SignatureId,
    ) -> MethodId {
        self.bridge
            .bind_instance_method(handle, method, signature)
            .unwrap_or(INVALID_METHOD)
    }

    /// Bind a method on a named instance, returning its id or `0`
    pub fn bind_instance_method_guid(
        &mut self,
        key: &str,
        method: &str,
        signature: SignatureId,
    ) -> MethodId {
        self.bridge
            .bind_instance_method_named(key, method, signature)
            .unwrap_or(INVALID_METHOD)
    }

    /// Bind a static method, returning its id or `0`
    pub fn bind_static_method(
        &mut self,
        type_name: &str,
        method: &str,
        signature: SignatureId,
    ) -> MethodId {
        self.bridge
            .bind_static_method(type_name, method, signature)
            .unwrap_or(INVALID_METHOD)
    }

    /// Invoke a bound method through the raw calling convention
    ///
    /// # Safety
    /// See [`Bridge::invoke_raw`].
    pub unsafe fn invoke(
        &mut self,
        id: MethodId,
        args: *const *const c_void,
        arg_count: i32,
        ret: *mut c_void,
    ) -> bool {
        self.bridge.invoke_raw(id, args, arg_count, ret).is_ok()
    }

    /// Shut down and release the process slot
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.bridge.state() == BridgeState::Terminated {
            return;
        }
        if let Ok(unloaded) = self.bridge.shutdown() {
            drop(unloaded);
        }
        self.libraries.clear();
    }

    fn fail(&self, operation: &str, err: HostError) -> bool {
        // Bridge errors were already reported by the bridge itself
        if !matches!(err, HostError::Bridge(_)) {
            self.bridge
                .diagnostics()
                .log(LogLevel::Warn, &format!("{}: {}", operation, err));
        }
        false
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Identity of a library file, for matching reloads against loaded libraries
fn library_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn open_assembly(path: &Path) -> Result<(Library, Assembly), HostError> {
    let load_err = |source| HostError::Load {
        path: path.display().to_string(),
        source,
    };
    let library = Library::open(path).map_err(load_err)?;
    let assembly = library.load_assembly().map_err(load_err)?;
    Ok((library, assembly))
}
