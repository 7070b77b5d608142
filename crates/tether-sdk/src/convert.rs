//! Conversion between Rust types and bridge values.
//!
//! `ManagedValue` plays the role of both directions at once: it names the
//! declared [`ValueType`] of a Rust type and converts to and from [`Value`].
//! Primitives are covered here; structs opt in through [`Blittable`] and the
//! [`managed_struct!`](crate::managed_struct) macro.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{managed_struct, Blittable};
//!
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! pub struct Vector3 { pub x: f32, pub y: f32, pub z: f32 }
//!
//! unsafe impl Blittable for Vector3 {
//!     const TYPE_NAME: &'static str = "Game.Vector3";
//! }
//! managed_struct!(Vector3);
//! ```

use crate::error::{ManagedError, SdkResult};
use crate::value::{StructLayout, StructValue, Value, ValueType};

/// A Rust type that can occupy a parameter or return slot.
pub trait ManagedValue: Sized + 'static {
    /// Declared type of this Rust type on the bridge
    fn value_type() -> ValueType;

    /// Convert from a bridge value, failing if the type doesn't match
    fn from_value(value: &Value) -> SdkResult<Self>;

    /// Convert into a bridge value
    fn into_value(self) -> Value;
}

fn mismatch(expected: &str, value: &Value) -> ManagedError {
    ManagedError::TypeMismatch {
        expected: expected.to_string(),
        got: value.type_name().to_string(),
    }
}

impl ManagedValue for () {
    fn value_type() -> ValueType {
        ValueType::Void
    }

    fn from_value(value: &Value) -> SdkResult<Self> {
        if value.is_void() {
            Ok(())
        } else {
            Err(mismatch("void", value))
        }
    }

    fn into_value(self) -> Value {
        Value::Void
    }
}

impl ManagedValue for i32 {
    fn value_type() -> ValueType {
        ValueType::I32
    }

    fn from_value(value: &Value) -> SdkResult<Self> {
        value.as_i32().ok_or_else(|| mismatch("int", value))
    }

    fn into_value(self) -> Value {
        Value::I32(self)
    }
}

impl ManagedValue for f32 {
    fn value_type() -> ValueType {
        ValueType::F32
    }

    fn from_value(value: &Value) -> SdkResult<Self> {
        value.as_f32().ok_or_else(|| mismatch("float", value))
    }

    fn into_value(self) -> Value {
        Value::F32(self)
    }
}

impl ManagedValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn from_value(value: &Value) -> SdkResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

/// A struct that crosses the bridge by bitwise copy.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or `#[repr(transparent)]`), contain
/// no padding bytes, and be valid for every bit pattern of their size. The
/// bridge reads and writes them with unaligned byte copies.
pub unsafe trait Blittable: Copy + Send + 'static {
    /// Full managed type name, e.g. `Game.Vector3`
    const TYPE_NAME: &'static str;

    /// Layout of this struct on the bridge
    fn layout() -> StructLayout {
        StructLayout::of::<Self>(Self::TYPE_NAME)
    }
}

/// Copy a blittable struct into a bridge value
pub fn struct_to_value<T: Blittable>(value: T) -> Value {
    let size = std::mem::size_of::<T>();
    // SAFETY: Blittable guarantees no padding, so all `size` bytes are initialized.
    let bytes = unsafe { std::slice::from_raw_parts(&value as *const T as *const u8, size) };
    Value::Struct(StructValue::new(T::TYPE_NAME, bytes.to_vec()))
}

/// Copy a blittable struct out of a bridge value
pub fn struct_from_value<T: Blittable>(value: &Value) -> SdkResult<T> {
    match value {
        Value::Struct(s)
            if s.type_name() == T::TYPE_NAME && s.bytes().len() == std::mem::size_of::<T>() =>
        {
            // SAFETY: length checked above; Blittable guarantees any bit pattern is valid.
            Ok(unsafe { std::ptr::read_unaligned(s.bytes().as_ptr() as *const T) })
        }
        _ => Err(mismatch(T::TYPE_NAME, value)),
    }
}

/// Implement [`ManagedValue`] for a type that already implements [`Blittable`].
#[macro_export]
macro_rules! managed_struct {
    ($ty:ty) => {
        impl $crate::ManagedValue for $ty {
            fn value_type() -> $crate::ValueType {
                $crate::ValueType::Struct(<$ty as $crate::Blittable>::layout())
            }

            fn from_value(value: &$crate::Value) -> $crate::SdkResult<Self> {
                $crate::struct_from_value::<$ty>(value)
            }

            fn into_value(self) -> $crate::Value {
                $crate::struct_to_value(self)
            }
        }
    };
}
