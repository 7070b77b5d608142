//! Pointer marshaling for the raw calling convention
//!
//! Arguments arrive as an array of untyped pointers, one per parameter, each
//! referencing memory laid out as that parameter's [`ValueType`]. Values are
//! read and written with unaligned copies; [`LayoutCheck::Validate`] adds
//! null and alignment checks in front of them.

use std::ffi::c_void;
use std::ptr;

use tether_sdk::{StructValue, Value, ValueType};

/// How much the dispatcher checks caller-supplied pointers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayoutCheck {
    /// Pointers are used as given
    Trust,
    /// Null and misaligned pointers are rejected before the call
    #[default]
    Validate,
}

/// Problem found by [`check_pointer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointerFault {
    Null,
    Misaligned,
}

/// Check that a pointer is non-null and aligned for `ty`
pub(crate) fn check_pointer(ptr: *const c_void, ty: &ValueType) -> Result<(), PointerFault> {
    if ptr.is_null() {
        return Err(PointerFault::Null);
    }
    if (ptr as usize) % ty.align().max(1) != 0 {
        return Err(PointerFault::Misaligned);
    }
    Ok(())
}

/// Read a value of type `ty`
///
/// # Safety
/// `ptr` must be valid for reads of `ty.size()` bytes.
pub(crate) unsafe fn read_value(ptr: *const c_void, ty: &ValueType) -> Value {
    match ty {
        ValueType::Void => Value::Void,
        ValueType::I32 => Value::I32(ptr::read_unaligned(ptr as *const i32)),
        ValueType::F32 => Value::F32(ptr::read_unaligned(ptr as *const f32)),
        ValueType::Bool => Value::Bool(ptr::read_unaligned(ptr as *const i32) != 0),
        ValueType::Struct(layout) => {
            let bytes = std::slice::from_raw_parts(ptr as *const u8, layout.size);
            Value::Struct(StructValue::new(layout.name.clone(), bytes.to_vec()))
        }
    }
}

/// Write a value
///
/// # Safety
/// `ptr` must be valid for writes of the value's size.
pub(crate) unsafe fn write_value(ptr: *mut c_void, value: &Value) {
    match value {
        Value::Void => {}
        Value::I32(i) => ptr::write_unaligned(ptr as *mut i32, *i),
        Value::F32(f) => ptr::write_unaligned(ptr as *mut f32, *f),
        Value::Bool(b) => ptr::write_unaligned(ptr as *mut i32, i32::from(*b)),
        Value::Struct(s) => {
            ptr::copy_nonoverlapping(s.bytes().as_ptr(), ptr as *mut u8, s.bytes().len())
        }
    }
}
