//! Instance registry
//!
//! Live managed objects are addressed either by an integer handle minted
//! here or by a caller-chosen string key. Both live in one store keyed by
//! [`InstanceKey`], so a handle can never reach a named instance and vice
//! versa.

use std::fmt;

use rustc_hash::FxHashMap;
use tether_sdk::ManagedObject;

use crate::error::{BridgeError, BridgeResult};
use crate::runtime::CreatedObject;
use crate::types::TypeName;

/// Integer instance handle
pub type InstanceHandle = i32;

/// Sentinel returned when no instance was created
pub const INVALID_HANDLE: InstanceHandle = 0;

/// Address of a live instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceKey {
    /// Bridge-assigned handle
    Handle(InstanceHandle),
    /// Caller-chosen key
    Named(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Handle(h) => write!(f, "#{}", h),
            InstanceKey::Named(key) => write!(f, "{:?}", key),
        }
    }
}

struct InstanceEntry {
    type_name: TypeName,
    object: ManagedObject,
}

/// Store of live instances
pub struct InstanceRegistry {
    entries: FxHashMap<InstanceKey, InstanceEntry>,
    next_handle: i64,
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    /// Create an empty registry. The first handle is 1.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            next_handle: 1,
        }
    }

    /// Store an object under a newly minted handle
    pub fn insert(&mut self, created: CreatedObject) -> BridgeResult<InstanceHandle> {
        let handle = InstanceHandle::try_from(self.next_handle)
            .map_err(|_| BridgeError::HandlesExhausted)?;
        self.next_handle += 1;
        self.entries.insert(
            InstanceKey::Handle(handle),
            InstanceEntry {
                type_name: created.type_name,
                object: created.object,
            },
        );
        Ok(handle)
    }

    /// Check that a caller key is usable before constructing anything
    pub fn check_key(&self, key: &str) -> BridgeResult<()> {
        if key.is_empty() {
            return Err(BridgeError::EmptyKey);
        }
        if self.entries.contains_key(&InstanceKey::Named(key.to_string())) {
            return Err(BridgeError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    /// Store an object under a caller-chosen key. Existing keys are never replaced.
    pub fn insert_named(&mut self, key: &str, created: CreatedObject) -> BridgeResult<()> {
        self.check_key(key)?;
        self.entries.insert(
            InstanceKey::Named(key.to_string()),
            InstanceEntry {
                type_name: created.type_name,
                object: created.object,
            },
        );
        Ok(())
    }

    /// Drop an instance
    pub fn remove(&mut self, key: &InstanceKey) -> BridgeResult<()> {
        self.entries
            .remove(key)
            .map(drop)
            .ok_or_else(|| BridgeError::InstanceNotFound(key.clone()))
    }

    /// Check if an instance is live
    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Canonical type name of a live instance
    pub fn type_of(&self, key: &InstanceKey) -> Option<&TypeName> {
        self.entries.get(key).map(|e| &e.type_name)
    }

    /// Mutable access to a live object
    pub fn object_mut(&mut self, key: &InstanceKey) -> Option<&mut ManagedObject> {
        self.entries.get_mut(key).map(|e| &mut e.object)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no instance is live
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every instance. Handles already minted stay retired.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn set_next_handle(&mut self, next: i64) {
        self.next_handle = next;
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("live", &self.entries.len())
            .field("next_handle", &self.next_handle)
            .finish()
    }
}
