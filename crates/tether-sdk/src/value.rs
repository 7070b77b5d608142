//! Values and value types that cross the bridge
//!
//! Only value types are marshaled. Every parameter and return type the
//! bridge knows about is one of the primitive kinds below or a blittable
//! struct described by its [`StructLayout`].
//!
//! # Wire sizes
//!
//! ```text
//! Void   0 bytes
//! I32    4 bytes, align 4
//! F32    4 bytes, align 4
//! Bool   4 bytes, align 4  (nonzero = true, written as 1/0)
//! Struct layout.size bytes, align layout.align
//! ```

use std::fmt;

/// Size and alignment of a blittable struct, keyed by its full type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructLayout {
    /// Full type name, e.g. `Game.Vector3`
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Alignment in bytes
    pub align: usize,
}

impl StructLayout {
    /// Describe the layout of a Rust type under the given managed name.
    pub fn of<T>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }
}

/// The declared type of a parameter or return slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value (return slot only)
    Void,
    /// 32-bit signed integer
    I32,
    /// 32-bit float
    F32,
    /// Boolean, marshaled as a 32-bit integer
    Bool,
    /// Blittable struct
    Struct(StructLayout),
}

impl ValueType {
    /// Number of bytes this type occupies in an argument or return buffer
    pub fn size(&self) -> usize {
        match self {
            ValueType::Void => 0,
            ValueType::I32 | ValueType::F32 | ValueType::Bool => 4,
            ValueType::Struct(layout) => layout.size,
        }
    }

    /// Required alignment of an argument or return buffer
    pub fn align(&self) -> usize {
        match self {
            ValueType::Void => 1,
            ValueType::I32 | ValueType::F32 | ValueType::Bool => 4,
            ValueType::Struct(layout) => layout.align,
        }
    }

    /// Check if this is the "no value" type
    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Void)
    }

    /// Canonical name used in diagnostics
    pub fn name(&self) -> &str {
        match self {
            ValueType::Void => "void",
            ValueType::I32 => "int",
            ValueType::F32 => "float",
            ValueType::Bool => "bool",
            ValueType::Struct(layout) => &layout.name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes of a blittable struct tagged with its full type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructValue {
    type_name: String,
    bytes: Vec<u8>,
}

impl StructValue {
    /// Wrap raw struct bytes
    pub fn new(type_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes,
        }
    }

    /// Full type name of the struct
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Raw struct bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An owned value passed to or returned from a managed member.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value
    Void,
    /// 32-bit signed integer
    I32(i32),
    /// 32-bit float
    F32(f32),
    /// Boolean
    Bool(bool),
    /// Blittable struct
    Struct(StructValue),
}

impl Value {
    /// Name of the value's type, in the same vocabulary as [`ValueType::name`]
    pub fn type_name(&self) -> &str {
        match self {
            Value::Void => "void",
            Value::I32(_) => "int",
            Value::F32(_) => "float",
            Value::Bool(_) => "bool",
            Value::Struct(s) => s.type_name(),
        }
    }

    /// Check whether this value can occupy a slot of the given type.
    ///
    /// Structs must agree on both the type name and the byte size.
    pub fn matches(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::Void, ValueType::Void)
            | (Value::I32(_), ValueType::I32)
            | (Value::F32(_), ValueType::F32)
            | (Value::Bool(_), ValueType::Bool) => true,
            (Value::Struct(s), ValueType::Struct(layout)) => {
                s.type_name() == layout.name && s.bytes().len() == layout.size
            }
            _ => false,
        }
    }

    /// Get as i32 if this is an i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f32 if this is an f32
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the struct payload if this is a struct
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this is the "no value" value
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::F32(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}
