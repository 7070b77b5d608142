//! Signature registry
//!
//! Maps caller-chosen integer ids to a return type and an ordered list of
//! parameter types. Type names are resolved once, at registration, through
//! the [`ManagedRuntime`]; bindings and invocations only ever see resolved
//! [`ValueType`]s.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tether_sdk::ValueType;

use crate::error::{BridgeError, BridgeResult};
use crate::runtime::ManagedRuntime;
use crate::types::TypeName;

/// Caller-assigned signature id
pub type SignatureId = i32;

/// A resolved method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    id: SignatureId,
    return_type: ValueType,
    params: Vec<ValueType>,
}

impl Signature {
    /// Signature id
    pub fn id(&self) -> SignatureId {
        self.id
    }

    /// Declared return type
    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// Declared parameter types, in order
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parameter list rendered for diagnostics, e.g. `int, float`
    pub fn params_display(&self) -> String {
        self.params
            .iter()
            .map(ValueType::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Registry of signatures by id
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    signatures: FxHashMap<SignatureId, Arc<Signature>>,
}

impl SignatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature.
    ///
    /// Registering the same shape under the same id again is a no-op that
    /// returns the existing record; a different shape is rejected.
    pub fn register<S: AsRef<str>>(
        &mut self,
        id: SignatureId,
        return_type: &str,
        params: &[S],
        runtime: &dyn ManagedRuntime,
    ) -> BridgeResult<Arc<Signature>> {
        if id < 0 {
            return Err(BridgeError::InvalidSignatureId(id));
        }

        let return_type = runtime.resolve_value_type(&TypeName::parse(return_type)?)?;
        let params = params
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let ty = runtime.resolve_value_type(&TypeName::parse(raw.as_ref())?)?;
                if ty.is_void() {
                    return Err(BridgeError::VoidParameter { id, index });
                }
                Ok(ty)
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        let signature = Signature {
            id,
            return_type,
            params,
        };

        if let Some(existing) = self.signatures.get(&id) {
            if **existing == signature {
                return Ok(Arc::clone(existing));
            }
            return Err(BridgeError::IncompatibleSignature(id));
        }

        let signature = Arc::new(signature);
        self.signatures.insert(id, Arc::clone(&signature));
        Ok(signature)
    }

    /// Look up a signature
    pub fn get(&self, id: SignatureId) -> BridgeResult<Arc<Signature>> {
        self.signatures
            .get(&id)
            .cloned()
            .ok_or(BridgeError::UnknownSignature(id))
    }

    /// Check if an id is registered
    pub fn contains(&self, id: SignatureId) -> bool {
        self.signatures.contains_key(&id)
    }

    /// Number of registered signatures
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Check if no signature is registered
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Drop every signature
    pub fn clear(&mut self) {
        self.signatures.clear();
    }
}
