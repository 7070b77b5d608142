//! Method binding table
//!
//! Binding resolves a (target, method name, signature) triple against the
//! managed side once and caches the callable under an integer method id.
//! Identical triples map to the same id while the binding is alive.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tether_sdk::MethodThunk;

use crate::error::{BridgeError, BridgeResult};
use crate::instance::{InstanceKey, InstanceRegistry};
use crate::runtime::ManagedRuntime;
use crate::signature::{Signature, SignatureId, SignatureRegistry};
use crate::types::TypeName;

/// Integer method id
pub type MethodId = i32;

/// Sentinel returned when binding failed
pub const INVALID_METHOD: MethodId = 0;

/// What a binding calls into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodTarget {
    /// A live instance
    Instance(InstanceKey),
    /// A type, for static members
    Static(TypeName),
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodTarget::Instance(key) => write!(f, "instance {}", key),
            MethodTarget::Static(name) => write!(f, "type {}", name),
        }
    }
}

/// A resolved, callable binding
#[derive(Clone)]
pub struct MethodBinding {
    id: MethodId,
    target: MethodTarget,
    signature: Arc<Signature>,
    thunk: MethodThunk,
    label: String,
}

impl MethodBinding {
    /// Method id
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Bound target
    pub fn target(&self) -> &MethodTarget {
        &self.target
    }

    /// Signature the binding was resolved against
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// `Type.Method` of the resolved member
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn thunk(&self) -> &MethodThunk {
        &self.thunk
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("signature", &self.signature.id())
            .field("label", &self.label)
            .finish()
    }
}

type CacheKey = (MethodTarget, String, SignatureId);

/// Table of live bindings
#[derive(Debug)]
pub struct BindingTable {
    bindings: FxHashMap<MethodId, MethodBinding>,
    cache: FxHashMap<CacheKey, MethodId>,
    next_id: i64,
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTable {
    /// Create an empty table. The first id is 1.
    pub fn new() -> Self {
        Self {
            bindings: FxHashMap::default(),
            cache: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Bind a method, or return the id of an identical live binding.
    ///
    /// The signature is checked before the target, and the target before
    /// the managed side is queried.
    pub fn bind(
        &mut self,
        target: MethodTarget,
        method: &str,
        signature_id: SignatureId,
        signatures: &SignatureRegistry,
        instances: &InstanceRegistry,
        runtime: &dyn ManagedRuntime,
    ) -> BridgeResult<MethodId> {
        let signature = signatures.get(signature_id)?;

        let (type_name, is_static) = match &target {
            MethodTarget::Instance(key) => {
                let type_name = instances
                    .type_of(key)
                    .ok_or_else(|| BridgeError::InstanceNotFound(key.clone()))?;
                (type_name.clone(), false)
            }
            MethodTarget::Static(name) => (name.clone(), true),
        };

        let cache_key = (target, method.to_string(), signature_id);
        if let Some(&id) = self.cache.get(&cache_key) {
            return Ok(id);
        }

        let resolved = runtime.find_method(&type_name, method, is_static, &signature)?;

        let id = MethodId::try_from(self.next_id).map_err(|_| BridgeError::MethodIdsExhausted)?;
        self.next_id += 1;

        let binding = MethodBinding {
            id,
            target: cache_key.0.clone(),
            signature,
            thunk: resolved.thunk,
            label: resolved.label,
        };
        self.bindings.insert(id, binding);
        self.cache.insert(cache_key, id);
        Ok(id)
    }

    /// Look up a live binding
    pub fn get(&self, id: MethodId) -> BridgeResult<&MethodBinding> {
        self.bindings.get(&id).ok_or(BridgeError::UnknownMethod(id))
    }

    /// Drop every binding against an instance, returning how many were dropped
    pub fn invalidate_target(&mut self, key: &InstanceKey) -> usize {
        let before = self.bindings.len();
        self.bindings
            .retain(|_, b| !matches!(&b.target, MethodTarget::Instance(k) if k == key));
        self.cache
            .retain(|(target, _, _), _| !matches!(target, MethodTarget::Instance(k) if k == key));
        before - self.bindings.len()
    }

    /// Number of live bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if no binding is live
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every binding. Ids already minted stay retired.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.cache.clear();
    }
}
