//! The managed side as seen by the bridge
//!
//! The bridge never touches managed reflection directly. Everything it needs
//! from the managed side goes through [`ManagedRuntime`]: resolving a type
//! name to a marshalable [`ValueType`], default-constructing an object, and
//! finding a member by name and exact signature.
//!
//! [`AssemblyDomain`] is the in-process implementation over loaded
//! [`Assembly`] catalogs.

use std::panic::{self, AssertUnwindSafe};

use tether_sdk::{Assembly, ManagedError, ManagedObject, MethodThunk, TypeDef, TypeKind, ValueType};
use tracing::debug;

use crate::error::{panic_message, BridgeError, BridgeResult};
use crate::signature::Signature;
use crate::types::TypeName;

/// A freshly constructed managed object
pub struct CreatedObject {
    /// Canonical name of the object's type, qualified with its assembly
    pub type_name: TypeName,
    /// The object itself
    pub object: ManagedObject,
}

/// A member resolved against a signature
pub struct ResolvedMethod {
    /// `Type.Method`, for diagnostics
    pub label: String,
    /// Callable body
    pub thunk: MethodThunk,
}

/// Reflection primitives the bridge needs from the managed side.
pub trait ManagedRuntime {
    /// Resolve a type name to a type that can occupy a parameter or return slot
    fn resolve_value_type(&self, name: &TypeName) -> BridgeResult<ValueType>;

    /// Default-construct an object of the named type
    fn create_object(&self, name: &TypeName) -> BridgeResult<CreatedObject>;

    /// Find a member by name, static-ness and exact signature
    fn find_method(
        &self,
        type_name: &TypeName,
        method: &str,
        is_static: bool,
        signature: &Signature,
    ) -> BridgeResult<ResolvedMethod>;
}

// ============================================================================
// Assembly Domain
// ============================================================================

/// The set of assemblies currently loaded into the bridge.
#[derive(Debug, Default)]
pub struct AssemblyDomain {
    assemblies: Vec<Assembly>,
}

impl AssemblyDomain {
    /// Create an empty domain
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an assembly. Names must be unique within the domain.
    pub fn load(&mut self, assembly: Assembly) -> BridgeResult<()> {
        if self.get(assembly.name()).is_some() {
            return Err(BridgeError::AssemblyAlreadyLoaded(assembly.name().to_string()));
        }
        debug!(
            assembly = assembly.name(),
            version = assembly.version(),
            types = assembly.type_count(),
            "Loaded assembly"
        );
        self.assemblies.push(assembly);
        Ok(())
    }

    /// Remove one assembly by name
    pub fn unload(&mut self, name: &str) -> Option<Assembly> {
        let idx = self.assemblies.iter().position(|a| a.name() == name)?;
        Some(self.assemblies.remove(idx))
    }

    /// Remove every assembly, returning them in load order
    pub fn unload_all(&mut self) -> Vec<Assembly> {
        std::mem::take(&mut self.assemblies)
    }

    /// Look up a loaded assembly by name
    pub fn get(&self, name: &str) -> Option<&Assembly> {
        self.assemblies.iter().find(|a| a.name() == name)
    }

    /// Names of loaded assemblies, in load order
    pub fn assembly_names(&self) -> Vec<String> {
        self.assemblies.iter().map(|a| a.name().to_string()).collect()
    }

    /// Whether any assembly is loaded
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    /// Find a type definition.
    ///
    /// A module qualifier restricts the search to that assembly. Otherwise an
    /// exact full-name match in any assembly wins over a simple-name match.
    pub fn find_type(&self, name: &TypeName) -> Option<(&Assembly, &TypeDef)> {
        if let Some(module) = name.module() {
            let assembly = self.get(module)?;
            return assembly
                .find_type(name.full_name())
                .map(|def| (assembly, def));
        }

        self.assemblies
            .iter()
            .find_map(|a| a.get_type(name.full_name()).map(|def| (a, def)))
            .or_else(|| {
                self.assemblies.iter().find_map(|a| {
                    a.types()
                        .iter()
                        .find(|t| t.simple_name() == name.full_name())
                        .map(|def| (a, def))
                })
            })
    }

    fn require_type(&self, name: &TypeName) -> BridgeResult<(&Assembly, &TypeDef)> {
        self.find_type(name)
            .ok_or_else(|| BridgeError::TypeNotFound(name.to_string()))
    }
}

impl ManagedRuntime for AssemblyDomain {
    fn resolve_value_type(&self, name: &TypeName) -> BridgeResult<ValueType> {
        if let Some(ty) = name.primitive() {
            return Ok(ty);
        }
        let (_, def) = self.require_type(name)?;
        def.as_value_type()
            .ok_or_else(|| BridgeError::UnsupportedType(def.full_name().to_string()))
    }

    fn create_object(&self, name: &TypeName) -> BridgeResult<CreatedObject> {
        let (assembly, def) = self.require_type(name)?;
        let ctor = match (def.kind(), def.constructor()) {
            (TypeKind::Class, Some(ctor)) => ctor,
            _ => return Err(BridgeError::NoDefaultConstructor(def.full_name().to_string())),
        };

        let label = format!("{}..ctor", def.full_name());
        let object = match panic::catch_unwind(AssertUnwindSafe(|| ctor())) {
            Ok(Ok(object)) => object,
            Ok(Err(source)) => return Err(BridgeError::Managed { method: label, source }),
            Err(payload) => {
                return Err(BridgeError::Managed {
                    method: label,
                    source: ManagedError::Panic(panic_message(payload)),
                })
            }
        };

        let type_name = TypeName::parse(&format!("{}, {}", def.full_name(), assembly.name()))?;
        Ok(CreatedObject { type_name, object })
    }

    fn find_method(
        &self,
        type_name: &TypeName,
        method: &str,
        is_static: bool,
        signature: &Signature,
    ) -> BridgeResult<ResolvedMethod> {
        let (_, def) = self.require_type(type_name)?;
        let found = def
            .find_method(method, is_static, signature.params(), signature.return_type())
            .ok_or_else(|| BridgeError::MethodNotFound {
                type_name: def.full_name().to_string(),
                method: method.to_string(),
                params: signature.params_display(),
                ret: signature.return_type().to_string(),
            })?;

        Ok(ResolvedMethod {
            label: format!("{}.{}", def.full_name(), found.name()),
            thunk: found.thunk(),
        })
    }
}
