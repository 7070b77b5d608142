//! Loading assembly libraries built as separate cdylibs
//!
//! The sample libraries come from `tether-sample` and `tether-sample-v2`.
//! Tests skip when they have not been built yet; build them with
//! `cargo build -p tether-sample -p tether-sample-v2`.

mod common;

use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};

use common::{arg, ret};
use parking_lot::Mutex;
use tether_core::{BridgeState, INVALID_HANDLE, INVALID_METHOD};
use tether_host::ffi::*;
use tether_host::{Host, HostConfig};

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn library_file(crate_name: &str) -> String {
    let stem = crate_name.replace('-', "_");
    #[cfg(target_os = "macos")]
    return format!("lib{}.dylib", stem);
    #[cfg(target_os = "windows")]
    return format!("{}.dll", stem);
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    return format!("lib{}.so", stem);
}

/// Locate a built sample library, or `None` to skip
fn sample_library(crate_name: &str) -> Option<PathBuf> {
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            dir.pop(); // Go to workspace root
            dir.pop();
            dir.join("target")
        });

    let found = ["debug", "release"]
        .iter()
        .map(|profile| target.join(profile).join(library_file(crate_name)))
        .find(|path| path.exists());
    if found.is_none() {
        eprintln!(
            "Skipping test: {} not built. Build with 'cargo build -p {}'",
            library_file(crate_name),
            crate_name
        );
    }
    found
}

/// Copy a library to `dest` as a fresh file, so the loader sees a new image
fn install(library: &Path, dest: &Path) {
    let _ = fs::remove_file(dest);
    fs::copy(library, dest).unwrap();
}

/// Shuts the C ABI runtime down even when an assertion fails
struct Runtime;

impl Drop for Runtime {
    fn drop(&mut self) {
        tether_shutdown();
    }
}

fn booted() -> Host {
    Host::boot(HostConfig::default(), None).unwrap()
}

unsafe fn add(host: &mut Host, a: i32, b: i32) -> Option<i32> {
    if !host.register_signature(10, "int", &["int", "int"]) {
        return None;
    }
    let id = host.bind_static_method("Scripts.Calc", "Add", 10);
    let args = [arg(&a), arg(&b)];
    let mut out = 0i32;
    host.invoke(id, args.as_ptr(), 2, ret(&mut out)).then_some(out)
}

#[test]
fn test_load_and_invoke_library() {
    let _serial = SERIAL.lock();
    let Some(v1) = sample_library("tether-sample") else {
        return;
    };

    let mut host = booted();
    assert!(host.load_assembly_file(&v1));
    assert_eq!(host.bridge().assembly_names(), vec!["Scripts"]);
    assert_eq!(unsafe { add(&mut host, 2, 3) }, Some(5));

    assert!(host.register_signature(11, "int", &["int"]));
    let counter = host.create_instance("Scripts.Counter, Scripts");
    assert_ne!(counter, INVALID_HANDLE);
    let id = host.bind_instance_method(counter, "Add", 11);
    assert_ne!(id, INVALID_METHOD);
    let mut out = 0i32;
    for n in [4, 6] {
        let args = [arg(&n)];
        assert!(unsafe { host.invoke(id, args.as_ptr(), 1, ret(&mut out)) });
    }
    assert_eq!(out, 10);

    // Loading the same assembly twice is rejected
    assert!(!host.load_assembly_file(&v1));

    assert!(host.unload_assemblies());
    assert_eq!(host.bridge().state(), BridgeState::Initialized);
    assert_eq!(unsafe { add(&mut host, 2, 3) }, None);
}

#[test]
fn test_boot_loads_configured_library() {
    let _serial = SERIAL.lock();
    let Some(v1) = sample_library("tether-sample") else {
        return;
    };

    let mut config = HostConfig::default();
    config.host.assemblies.push(v1);
    let mut host = Host::boot(config, None).unwrap();
    assert_eq!(host.bridge().state(), BridgeState::AssemblyLoaded);
    assert_eq!(unsafe { add(&mut host, 20, 22) }, Some(42));
}

#[test]
fn test_reload_rebuilt_library_in_place() {
    let _serial = SERIAL.lock();
    let (Some(v1), Some(v2)) = (
        sample_library("tether-sample"),
        sample_library("tether-sample-v2"),
    ) else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(library_file("scripts"));
    install(&v1, &path);

    let mut host = booted();
    assert!(host.load_assembly_file(&path));
    assert_eq!(unsafe { add(&mut host, 2, 3) }, Some(5));

    // Rebuild in place, then reload from the same path
    install(&v2, &path);
    assert!(host.reload_assembly_file(&path));
    assert_eq!(unsafe { add(&mut host, 2, 3) }, Some(105));
    assert_eq!(host.create_instance("Scripts.Counter"), INVALID_HANDLE);

    // And back again
    install(&v1, &path);
    assert!(host.reload_assembly_file(&path));
    assert_eq!(unsafe { add(&mut host, 2, 3) }, Some(5));
}

#[test]
fn test_reload_from_other_path() {
    let _serial = SERIAL.lock();
    let (Some(v1), Some(v2)) = (
        sample_library("tether-sample"),
        sample_library("tether-sample-v2"),
    ) else {
        return;
    };

    let mut host = booted();
    assert!(host.load_assembly_file(&v1));
    assert!(host.reload_assembly_file(&v2));
    assert_eq!(host.bridge().assembly_names(), vec!["Scripts"]);
    assert_eq!(unsafe { add(&mut host, 2, 3) }, Some(105));
}

#[test]
fn test_c_abi_loads_library() {
    let _serial = SERIAL.lock();
    let (Some(v1), Some(v2)) = (
        sample_library("tether-sample"),
        sample_library("tether-sample-v2"),
    ) else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(library_file("scripts"));
    install(&v1, &path);
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    let int = CString::new("int").unwrap();
    let params = [int.as_ptr(), int.as_ptr()];
    let calc = CString::new("Scripts.Calc").unwrap();
    let method = CString::new("Add").unwrap();
    let call = |a: i32, b: i32| unsafe {
        assert!(tether_register_signature(10, int.as_ptr(), params.as_ptr(), 2));
        let id = tether_bind_static_method(calc.as_ptr(), method.as_ptr(), 10);
        let args = [arg(&a), arg(&b)];
        let mut out = 0i32;
        assert!(tether_invoke(id, args.as_ptr(), 2, ret(&mut out)));
        out
    };

    assert!(tether_initialize_default(None));
    let _runtime = Runtime;
    unsafe {
        assert!(tether_load_assembly(c_path.as_ptr()));
        assert_eq!(call(2, 3), 5);

        install(&v2, &path);
        assert!(tether_reload_assembly(c_path.as_ptr()));
        assert_eq!(call(2, 3), 105);
    }
    assert!(tether_unload_assemblies());
}
