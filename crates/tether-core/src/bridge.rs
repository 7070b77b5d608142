//! Bridge lifecycle and public operations
//!
//! [`Bridge`] ties the registries together behind a small state machine:
//!
//! ```text
//! Uninitialized -> Initialized <-> AssemblyLoaded -> ShuttingDown -> Terminated
//! ```
//!
//! Registry operations are valid only once an assembly is loaded. Every
//! failure is reported through [`Diagnostics`] before it is returned, so
//! boundary layers can collapse errors to sentinels without losing detail.

use std::ffi::c_void;
use std::sync::Arc;

use tether_sdk::{Assembly, ManagedValue, Value};

use crate::binding::{BindingTable, MethodBinding, MethodId, MethodTarget};
use crate::diagnostics::{Diagnostics, LogCallback, LogLevel};
use crate::dispatch;
use crate::error::{BridgeError, BridgeResult};
use crate::instance::{InstanceHandle, InstanceKey, InstanceRegistry};
use crate::marshal::LayoutCheck;
use crate::runtime::{AssemblyDomain, ManagedRuntime};
use crate::signature::{Signature, SignatureId, SignatureRegistry};
use crate::types::TypeName;

/// Lifecycle state of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, not yet initialized
    Uninitialized,
    /// Initialized, no assembly loaded
    Initialized,
    /// At least one assembly loaded; registry operations available
    AssemblyLoaded,
    /// Tearing down
    ShuttingDown,
    /// Shut down; every operation fails
    Terminated,
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Name used to tag diagnostics
    pub name: String,
    /// Pointer checking for raw invocations
    pub layout_check: LayoutCheck,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            name: "tether".to_string(),
            layout_check: LayoutCheck::default(),
        }
    }
}

/// The invocation bridge
#[derive(Debug)]
pub struct Bridge {
    options: BridgeOptions,
    state: BridgeState,
    domain: AssemblyDomain,
    signatures: SignatureRegistry,
    instances: InstanceRegistry,
    bindings: BindingTable,
    diagnostics: Diagnostics,
}

impl Bridge {
    /// Create an uninitialized bridge
    pub fn new(options: BridgeOptions) -> Self {
        let diagnostics = Diagnostics::new(options.name.clone());
        Self {
            options,
            state: BridgeState::Uninitialized,
            domain: AssemblyDomain::new(),
            signatures: SignatureRegistry::new(),
            instances: InstanceRegistry::new(),
            bindings: BindingTable::new(),
            diagnostics,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize the bridge
    ///
    /// # Arguments
    /// * `callback` - Optional sink for diagnostic messages
    ///
    /// # Returns
    /// * `Ok(())` - Bridge moved to `Initialized`
    /// * `Err(BridgeError::InvalidState)` - Bridge was already initialized or shut down
    pub fn initialize(&mut self, callback: Option<LogCallback>) -> BridgeResult<()> {
        let result = self.require("initialize", &[BridgeState::Uninitialized]);
        self.track("initialize", result)?;

        self.diagnostics.set_callback(callback);
        self.state = BridgeState::Initialized;
        self.diagnostics.log(
            LogLevel::Info,
            &format!("Bridge '{}' initialized", self.options.name),
        );
        Ok(())
    }

    /// Load an assembly and log every type it exports
    pub fn load_assembly(&mut self, assembly: Assembly) -> BridgeResult<()> {
        let result = self
            .require(
                "load_assembly",
                &[BridgeState::Initialized, BridgeState::AssemblyLoaded],
            )
            .and_then(|_| self.load_unchecked(assembly));
        self.track("load_assembly", result)
    }

    fn load_unchecked(&mut self, assembly: Assembly) -> BridgeResult<()> {
        let summary = format!(
            "Loaded assembly {} {} ({} types)",
            assembly.name(),
            assembly.version(),
            assembly.type_count()
        );
        let types: Vec<String> = assembly
            .types()
            .iter()
            .map(|t| t.full_name().to_string())
            .collect();

        self.domain.load(assembly)?;
        self.state = BridgeState::AssemblyLoaded;

        self.diagnostics.log(LogLevel::Info, &summary);
        for name in types {
            self.diagnostics
                .log(LogLevel::Debug, &format!("  type {}", name));
        }
        Ok(())
    }

    /// Unload every assembly.
    ///
    /// Instances, bindings and signatures may all reference unloaded code,
    /// so they are cleared first. Returns the unloaded assemblies so that the
    /// caller can release whatever backs them only after the bridge is done
    /// with them.
    pub fn unload_assemblies(&mut self) -> BridgeResult<Vec<Assembly>> {
        let result = self.require(
            "unload_assemblies",
            &[BridgeState::Initialized, BridgeState::AssemblyLoaded],
        );
        self.track("unload_assemblies", result)?;

        self.clear_registries();
        let unloaded = self.domain.unload_all();
        self.state = BridgeState::Initialized;
        self.diagnostics.log(
            LogLevel::Info,
            &format!("Unloaded {} assemblies", unloaded.len()),
        );
        Ok(unloaded)
    }

    /// Unload one assembly by name.
    ///
    /// Clears every instance, binding and signature, as with
    /// [`unload_assemblies`](Self::unload_assemblies). Returns `None` when no
    /// assembly of that name is loaded.
    pub fn unload_assembly(&mut self, name: &str) -> BridgeResult<Option<Assembly>> {
        let result = self.require(
            "unload_assembly",
            &[BridgeState::Initialized, BridgeState::AssemblyLoaded],
        );
        self.track("unload_assembly", result)?;

        self.clear_registries();
        let unloaded = self.domain.unload(name);
        if self.domain.is_empty() {
            self.state = BridgeState::Initialized;
        }
        if unloaded.is_some() {
            self.diagnostics
                .log(LogLevel::Info, &format!("Unloaded assembly {}", name));
        }
        Ok(unloaded)
    }

    /// Replace an assembly with a new build of itself.
    ///
    /// Every instance, binding and signature is cleared, as with
    /// [`unload_assemblies`](Self::unload_assemblies); other assemblies stay
    /// loaded. Returns the replaced assembly, if one with the same name was
    /// loaded.
    pub fn reload_assembly(&mut self, assembly: Assembly) -> BridgeResult<Option<Assembly>> {
        let result = self.require(
            "reload_assembly",
            &[BridgeState::Initialized, BridgeState::AssemblyLoaded],
        );
        self.track("reload_assembly", result)?;

        self.clear_registries();
        let previous = self.domain.unload(assembly.name());
        if self.domain.is_empty() {
            self.state = BridgeState::Initialized;
        }
        self.diagnostics.log(
            LogLevel::Info,
            &format!("Reloading assembly {}", assembly.name()),
        );

        let result = self.load_unchecked(assembly);
        self.track("reload_assembly", result)?;
        Ok(previous)
    }

    /// Shut down, dropping every instance, binding and assembly.
    ///
    /// Returns the unloaded assemblies, as with
    /// [`unload_assemblies`](Self::unload_assemblies).
    pub fn shutdown(&mut self) -> BridgeResult<Vec<Assembly>> {
        let result = self.require(
            "shutdown",
            &[
                BridgeState::Uninitialized,
                BridgeState::Initialized,
                BridgeState::AssemblyLoaded,
            ],
        );
        self.track("shutdown", result)?;

        self.state = BridgeState::ShuttingDown;
        self.clear_registries();
        let unloaded = self.domain.unload_all();
        self.state = BridgeState::Terminated;
        self.diagnostics.log(
            LogLevel::Info,
            &format!("Bridge '{}' shut down", self.options.name),
        );
        Ok(unloaded)
    }

    fn clear_registries(&mut self) {
        // Bindings hold thunks into assembly code; drop them before objects
        self.bindings.clear();
        self.instances.clear();
        self.signatures.clear();
    }

    // ========================================================================
    // Signatures
    // ========================================================================

    /// Register a signature
    ///
    /// # Arguments
    /// * `id` - Caller-chosen, non-negative id
    /// * `return_type` - Return type name (`void` allowed)
    /// * `params` - Parameter type names, in order
    pub fn register_signature<S: AsRef<str>>(
        &mut self,
        id: SignatureId,
        return_type: &str,
        params: &[S],
    ) -> BridgeResult<Arc<Signature>> {
        let result = self.require_loaded("register_signature").and_then(|_| {
            self.signatures
                .register(id, return_type, params, &self.domain as &dyn ManagedRuntime)
        });
        self.track("register_signature", result)
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Default-construct an instance and return its handle
    pub fn create_instance(&mut self, type_name: &str) -> BridgeResult<InstanceHandle> {
        let result = self.require_loaded("create_instance").and_then(|_| {
            let created = self.domain.create_object(&TypeName::parse(type_name)?)?;
            self.instances.insert(created)
        });
        self.track("create_instance", result)
    }

    /// Default-construct an instance under a caller-chosen key.
    ///
    /// An existing instance under the same key is left untouched and the
    /// call fails.
    pub fn create_instance_named(&mut self, type_name: &str, key: &str) -> BridgeResult<()> {
        let result = self.require_loaded("create_instance_named").and_then(|_| {
            self.instances.check_key(key)?;
            let created = self.domain.create_object(&TypeName::parse(type_name)?)?;
            self.instances.insert_named(key, created)
        });
        self.track("create_instance_named", result)
    }

    /// Destroy an instance and every binding against it
    pub fn destroy_instance(&mut self, handle: InstanceHandle) -> BridgeResult<()> {
        let result = self.destroy(InstanceKey::Handle(handle));
        self.track("destroy_instance", result)
    }

    /// Destroy a named instance and every binding against it
    pub fn destroy_instance_named(&mut self, key: &str) -> BridgeResult<()> {
        let result = self.destroy(InstanceKey::Named(key.to_string()));
        self.track("destroy_instance_named", result)
    }

    fn destroy(&mut self, key: InstanceKey) -> BridgeResult<()> {
        self.require_loaded("destroy_instance")?;
        self.instances.remove(&key)?;
        let dropped = self.bindings.invalidate_target(&key);
        self.diagnostics.log(
            LogLevel::Trace,
            &format!("Destroyed instance {} ({} bindings invalidated)", key, dropped),
        );
        Ok(())
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Bind an instance method by handle
    pub fn bind_instance_method(
        &mut self,
        handle: InstanceHandle,
        method: &str,
        signature: SignatureId,
    ) -> BridgeResult<MethodId> {
        let result = self.bind(
            MethodTarget::Instance(InstanceKey::Handle(handle)),
            method,
            signature,
        );
        self.track("bind_instance_method", result)
    }

    /// Bind an instance method by caller key
    pub fn bind_instance_method_named(
        &mut self,
        key: &str,
        method: &str,
        signature: SignatureId,
    ) -> BridgeResult<MethodId> {
        let result = self.bind(
            MethodTarget::Instance(InstanceKey::Named(key.to_string())),
            method,
            signature,
        );
        self.track("bind_instance_method_named", result)
    }

    /// Bind a static method
    pub fn bind_static_method(
        &mut self,
        type_name: &str,
        method: &str,
        signature: SignatureId,
    ) -> BridgeResult<MethodId> {
        let result = TypeName::parse(type_name)
            .and_then(|name| self.bind(MethodTarget::Static(name), method, signature));
        self.track("bind_static_method", result)
    }

    fn bind(
        &mut self,
        target: MethodTarget,
        method: &str,
        signature: SignatureId,
    ) -> BridgeResult<MethodId> {
        self.require_loaded("bind")?;
        self.bindings.bind(
            target,
            method,
            signature,
            &self.signatures,
            &self.instances,
            &self.domain,
        )
    }

    /// Look up a live binding
    pub fn binding(&self, id: MethodId) -> Option<&MethodBinding> {
        self.bindings.get(id).ok()
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a bound method with owned arguments
    pub fn invoke(&mut self, id: MethodId, args: &[Value]) -> BridgeResult<Value> {
        let result = self.require_loaded("invoke").and_then(|_| {
            let binding = self.bindings.get(id)?;
            dispatch::invoke(binding, &mut self.instances, args)
        });
        self.track("invoke", result)
    }

    /// Invoke a bound method and convert the result
    pub fn call<R: ManagedValue>(&mut self, id: MethodId, args: &[Value]) -> BridgeResult<R> {
        let value = self.invoke(id, args)?;
        let result = R::from_value(&value).map_err(|_| BridgeError::ReturnType {
            method: self
                .bindings
                .get(id)
                .map(|b| b.label().to_string())
                .unwrap_or_default(),
            expected: R::value_type().to_string(),
            got: value.type_name().to_string(),
        });
        self.track("call", result)
    }

    /// Invoke a bound method through the raw pointer calling convention
    ///
    /// # Safety
    /// See [`dispatch::invoke_raw`]: `args` must hold `arg_count` pointers
    /// valid for their parameter types, and `ret` must be valid for the
    /// return type when it is non-void.
    pub unsafe fn invoke_raw(
        &mut self,
        id: MethodId,
        args: *const *const c_void,
        arg_count: i32,
        ret: *mut c_void,
    ) -> BridgeResult<()> {
        let check = self.options.layout_check;
        let result = self.require_loaded("invoke").and_then(|_| {
            let binding = self.bindings.get(id)?;
            unsafe {
                dispatch::invoke_raw(binding, &mut self.instances, args, arg_count, ret, check)
            }
        });
        self.track("invoke", result)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Options the bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Diagnostic channel
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Names of loaded assemblies
    pub fn assembly_names(&self) -> Vec<String> {
        self.domain.assembly_names()
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of live bindings
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of registered signatures
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Check if an instance handle is live
    pub fn has_instance(&self, handle: InstanceHandle) -> bool {
        self.instances.contains(&InstanceKey::Handle(handle))
    }

    /// Check if a named instance is live
    pub fn has_named_instance(&self, key: &str) -> bool {
        self.instances.contains(&InstanceKey::Named(key.to_string()))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require(&self, operation: &'static str, allowed: &[BridgeState]) -> BridgeResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_loaded(&self, operation: &'static str) -> BridgeResult<()> {
        self.require(operation, &[BridgeState::AssemblyLoaded])
    }

    fn track<T>(&self, operation: &str, result: BridgeResult<T>) -> BridgeResult<T> {
        if let Err(err) = &result {
            self.diagnostics.report(operation, err);
        }
        result
    }
}
