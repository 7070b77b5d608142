//! Integration tests for the raw pointer calling convention

mod common;

use std::ffi::c_void;
use std::ptr;

use common::{loaded_bridge, loaded_bridge_with, Transform, Vector3};
use tether_core::{Bridge, BridgeError, LayoutCheck, MethodId};

fn arg<T>(value: &T) -> *const c_void {
    value as *const T as *const c_void
}

fn out<T>(value: &mut T) -> *mut c_void {
    value as *mut T as *mut c_void
}

fn bind_add(bridge: &mut Bridge) -> MethodId {
    bridge.register_signature(10, "int", &["int", "int"]).unwrap();
    let adder = bridge.create_instance("Adder").unwrap();
    bridge.bind_instance_method(adder, "Add", 10).unwrap()
}

#[test]
fn test_raw_round_trip() {
    let mut bridge = loaded_bridge();
    let add = bind_add(&mut bridge);

    let (a, b) = (2i32, 3i32);
    let args = [arg(&a), arg(&b)];
    let mut ret = 0i32;
    unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) }.unwrap();
    assert_eq!(ret, 5);
}

#[test]
fn test_arity_checked_before_pointers() {
    let mut bridge = loaded_bridge();
    let add = bind_add(&mut bridge);
    let mut ret = -1i32;

    // Null argument array would be fatal if the count were trusted
    for count in [0, 1, 3, -1] {
        let err = unsafe { bridge.invoke_raw(add, ptr::null(), count, out(&mut ret)) }.unwrap_err();
        assert!(matches!(err, BridgeError::ArityMismatch { expected: 2, .. }));
    }
    assert_eq!(ret, -1);
}

#[test]
fn test_missing_return_buffer() {
    let mut bridge = loaded_bridge();
    let add = bind_add(&mut bridge);
    let (a, b) = (1i32, 1i32);
    let args = [arg(&a), arg(&b)];
    assert!(matches!(
        unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, ptr::null_mut()) },
        Err(BridgeError::MissingReturnBuffer(_))
    ));
}

#[test]
fn test_void_return_ignores_buffer() {
    let mut bridge = loaded_bridge();
    bridge.register_signature(1, "void", &["float"]).unwrap();
    bridge.register_signature(2, "float", &[] as &[&str]).unwrap();
    let player = bridge.create_instance("Player").unwrap();
    let update = bridge.bind_instance_method(player, "Update", 1).unwrap();
    let elapsed = bridge.bind_instance_method(player, "Elapsed", 2).unwrap();

    let dt = 0.5f32;
    let args = [arg(&dt)];
    let mut untouched = 99i32;
    unsafe {
        bridge.invoke_raw(update, args.as_ptr(), 1, ptr::null_mut()).unwrap();
        bridge.invoke_raw(update, args.as_ptr(), 1, out(&mut untouched)).unwrap();
    }
    assert_eq!(untouched, 99);

    let mut total = 0f32;
    unsafe { bridge.invoke_raw(elapsed, ptr::null(), 0, out(&mut total)) }.unwrap();
    assert_eq!(total, 1.0);
}

#[test]
fn test_bool_marshaled_as_int() {
    let mut bridge = loaded_bridge();
    bridge.register_signature(5, "bool", &["bool"]).unwrap();
    let not = bridge.bind_static_method("Game.MathUtil", "Not", 5).unwrap();

    let input = 7i32;
    let args = [arg(&input)];
    let mut ret = 42i32;
    unsafe { bridge.invoke_raw(not, args.as_ptr(), 1, out(&mut ret)) }.unwrap();
    assert_eq!(ret, 0);

    let input = 0i32;
    let args = [arg(&input)];
    unsafe { bridge.invoke_raw(not, args.as_ptr(), 1, out(&mut ret)) }.unwrap();
    assert_eq!(ret, 1);
}

#[test]
fn test_struct_in_and_out() {
    let mut bridge = loaded_bridge();
    bridge.register_signature(6, "Game.Vector3", &["Game.Vector3", "float"]).unwrap();
    bridge.register_signature(7, "Transform", &["Transform"]).unwrap();
    let scale = bridge.bind_static_method("MathUtil", "Scale", 6).unwrap();
    let translate = bridge.bind_static_method("MathUtil", "Translate", 7).unwrap();

    let v = Vector3 { x: 1.0, y: -2.0, z: 0.5 };
    let k = 2.0f32;
    let args = [arg(&v), arg(&k)];
    let mut ret = Vector3::default();
    unsafe { bridge.invoke_raw(scale, args.as_ptr(), 2, out(&mut ret)) }.unwrap();
    assert_eq!(ret, Vector3 { x: 2.0, y: -4.0, z: 1.0 });

    let t = Transform {
        position: Vector3 { x: 1.0, y: 2.0, z: 3.0 },
        rotation: Vector3::default(),
        scale: Vector3 { x: 1.0, y: 1.0, z: 1.0 },
    };
    let args = [arg(&t)];
    let mut moved = Transform::default();
    unsafe { bridge.invoke_raw(translate, args.as_ptr(), 1, out(&mut moved)) }.unwrap();
    assert_eq!(moved.position.x, 2.0);
    assert_eq!(moved.scale, t.scale);
}

#[test]
fn test_validate_rejects_bad_pointers() {
    let mut bridge = loaded_bridge();
    let add = bind_add(&mut bridge);
    let mut ret = -1i32;

    let a = 1i32;
    let args = [arg(&a), ptr::null()];
    assert!(matches!(
        unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) },
        Err(BridgeError::NullArgument(1))
    ));

    let raw = [0u8; 16];
    let base = raw.as_ptr();
    let offset = if (base as usize) % 4 == 0 { 1 } else { 0 };
    let misaligned = unsafe { base.add(offset) } as *const c_void;
    let args = [misaligned, arg(&a)];
    assert!(matches!(
        unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) },
        Err(BridgeError::MisalignedArgument { index: 0, align: 4 })
    ));

    let mut ret_raw = [0u32; 4];
    let ret_bad = unsafe { (ret_raw.as_mut_ptr() as *mut u8).add(1) } as *mut c_void;
    let args = [arg(&a), arg(&a)];
    assert!(matches!(
        unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, ret_bad) },
        Err(BridgeError::MisalignedReturn(4))
    ));

    assert!(matches!(
        unsafe { bridge.invoke_raw(add, ptr::null(), 2, out(&mut ret)) },
        Err(BridgeError::NullArgumentArray)
    ));
    assert_eq!(ret, -1);
}

#[test]
fn test_trust_mode_reads_unaligned() {
    let mut bridge = loaded_bridge_with(LayoutCheck::Trust);
    let add = bind_add(&mut bridge);

    let mut raw = [0u8; 16];
    let offset = if (raw.as_ptr() as usize) % 4 == 0 { 1 } else { 0 };
    raw[offset..offset + 4].copy_from_slice(&20i32.to_ne_bytes());
    let b = 22i32;
    let args = [unsafe { raw.as_ptr().add(offset) } as *const c_void, arg(&b)];

    let mut ret = 0i32;
    unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) }.unwrap();
    assert_eq!(ret, 42);
}

#[test]
fn test_raw_invoke_stale_handle() {
    let mut bridge = loaded_bridge();
    let add = bind_add(&mut bridge);
    assert!(bridge.binding(add).is_some());

    bridge.unload_assemblies().unwrap();
    let (a, b) = (1i32, 2i32);
    let args = [arg(&a), arg(&b)];
    let mut ret = 0i32;
    assert!(unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) }.is_err());
    assert!(unsafe { bridge.invoke_raw(9999, args.as_ptr(), 2, out(&mut ret)) }.is_err());
}

#[test]
fn test_raw_panic_contained() {
    let mut bridge = loaded_bridge();
    bridge.register_signature(40, "int", &[] as &[&str]).unwrap();
    let faulty = bridge.create_instance("Faulty").unwrap();
    let boom = bridge.bind_instance_method(faulty, "Boom", 40).unwrap();

    let mut ret = 7i32;
    let err = unsafe { bridge.invoke_raw(boom, ptr::null(), 0, out(&mut ret)) }.unwrap_err();
    assert!(matches!(err, BridgeError::Managed { .. }));
    assert_eq!(ret, 7);

    let add = bind_add(&mut bridge);
    let (a, b) = (4i32, 4i32);
    let args = [arg(&a), arg(&b)];
    unsafe { bridge.invoke_raw(add, args.as_ptr(), 2, out(&mut ret)) }.unwrap();
    assert_eq!(ret, 8);
}
