//! Invocation dispatcher
//!
//! Both entry points check shape before anything reaches the managed side:
//! argument count first, then buffers, then each argument. The managed call
//! itself runs under `catch_unwind`, and its result is checked against the
//! declared return type before it is handed back.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use tether_sdk::{ManagedError, Value};

use crate::binding::{MethodBinding, MethodTarget};
use crate::error::{panic_message, BridgeError, BridgeResult};
use crate::instance::InstanceRegistry;
use crate::marshal::{self, check_pointer, LayoutCheck, PointerFault};

/// Invoke a binding with owned arguments
pub fn invoke(
    binding: &MethodBinding,
    instances: &mut InstanceRegistry,
    args: &[Value],
) -> BridgeResult<Value> {
    let signature = binding.signature();
    if args.len() != signature.arity() {
        return Err(BridgeError::ArityMismatch {
            expected: signature.arity(),
            got: args.len() as i64,
        });
    }

    for (index, (arg, ty)) in args.iter().zip(signature.params()).enumerate() {
        if !arg.matches(ty) {
            return Err(BridgeError::ArgumentType {
                index,
                expected: ty.to_string(),
                got: arg.type_name().to_string(),
            });
        }
    }

    call(binding, instances, args)
}

/// Invoke a binding through the raw pointer calling convention.
///
/// On success the return value, if any, has been written through `ret`.
///
/// # Safety
/// When `arg_count` matches the binding's arity, `args` must point to that
/// many pointers, each valid for reads of its parameter type's size. For a
/// non-void return, `ret` must be valid for writes of the return type's
/// size. Under [`LayoutCheck::Trust`] no pointer is checked at all.
pub unsafe fn invoke_raw(
    binding: &MethodBinding,
    instances: &mut InstanceRegistry,
    args: *const *const c_void,
    arg_count: i32,
    ret: *mut c_void,
    check: LayoutCheck,
) -> BridgeResult<()> {
    let signature = binding.signature();
    let arity = signature.arity();
    if i64::from(arg_count) != arity as i64 {
        return Err(BridgeError::ArityMismatch {
            expected: arity,
            got: i64::from(arg_count),
        });
    }

    let ret_ty = signature.return_type();
    if !ret_ty.is_void() {
        if ret.is_null() {
            return Err(BridgeError::MissingReturnBuffer(ret_ty.to_string()));
        }
        if check == LayoutCheck::Validate
            && check_pointer(ret as *const c_void, ret_ty) == Err(PointerFault::Misaligned)
        {
            return Err(BridgeError::MisalignedReturn(ret_ty.align()));
        }
    }

    if arity > 0 && args.is_null() {
        return Err(BridgeError::NullArgumentArray);
    }

    let mut values = Vec::with_capacity(arity);
    for (index, ty) in signature.params().iter().enumerate() {
        let ptr = *args.add(index);
        if check == LayoutCheck::Validate {
            match check_pointer(ptr, ty) {
                Ok(()) => {}
                Err(PointerFault::Null) => return Err(BridgeError::NullArgument(index)),
                Err(PointerFault::Misaligned) => {
                    return Err(BridgeError::MisalignedArgument {
                        index,
                        align: ty.align(),
                    })
                }
            }
        }
        values.push(marshal::read_value(ptr, ty));
    }

    let result = call(binding, instances, &values)?;
    if !ret_ty.is_void() {
        marshal::write_value(ret, &result);
    }
    Ok(())
}

fn call(
    binding: &MethodBinding,
    instances: &mut InstanceRegistry,
    args: &[Value],
) -> BridgeResult<Value> {
    let receiver = match binding.target() {
        MethodTarget::Instance(key) => Some(
            instances
                .object_mut(key)
                .ok_or_else(|| BridgeError::InstanceNotFound(key.clone()))?
                .as_mut(),
        ),
        MethodTarget::Static(_) => None,
    };

    let thunk = binding.thunk();
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || thunk(receiver, args)));
    let value = match outcome {
        Ok(Ok(value)) => value,
        Ok(Err(source)) => {
            return Err(BridgeError::Managed {
                method: binding.label().to_string(),
                source,
            })
        }
        Err(payload) => {
            return Err(BridgeError::Managed {
                method: binding.label().to_string(),
                source: ManagedError::Panic(panic_message(payload)),
            })
        }
    };

    let expected = binding.signature().return_type();
    if !value.matches(expected) {
        return Err(BridgeError::ReturnType {
            method: binding.label().to_string(),
            expected: expected.to_string(),
            got: value.type_name().to_string(),
        });
    }
    Ok(value)
}
