//! Shared fixtures for host tests

#![allow(dead_code)]

use std::ffi::c_void;

use tether_sdk::{Assembly, TypeBuilder};

#[derive(Default)]
pub struct Counter {
    pub count: i32,
}

/// Assembly `Scripts` with a counter and a calculator
pub fn scripts_assembly() -> Assembly {
    let mut scripts = Assembly::new("Scripts", "1.0.0");
    scripts.add_type(
        TypeBuilder::<Counter>::new("Scripts.Counter")
            .default_constructor()
            .method1("Add", |c: &mut Counter, n: i32| {
                c.count += n;
                c.count
            })
            .method0("Reset", |c: &mut Counter| c.count = 0)
            .build(),
    );
    scripts.add_type(
        TypeBuilder::<Counter>::new("Scripts.Calc")
            .static2("Add", |a: i32, b: i32| a + b)
            .static2("Ratio", |a: f32, b: f32| a / b)
            .build(),
    );
    scripts
}

/// Rebuild of `Scripts` where `Calc.Add` multiplies
pub fn scripts_assembly_v2() -> Assembly {
    let mut scripts = Assembly::new("Scripts", "2.0.0");
    scripts.add_type(
        TypeBuilder::<Counter>::new("Scripts.Calc")
            .static2("Add", |a: i32, b: i32| a * b)
            .build(),
    );
    scripts
}

pub fn arg<T>(value: &T) -> *const c_void {
    value as *const T as *const c_void
}

pub fn ret<T>(value: &mut T) -> *mut c_void {
    value as *mut T as *mut c_void
}
