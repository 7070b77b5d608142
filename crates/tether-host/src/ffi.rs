//! C ABI for the runtime host
//!
//! Every function locks one process-global slot holding the [`Host`], so
//! concurrent callers are serialized. Every call made before
//! `tether_initialize` or after `tether_shutdown` fails with the sentinel
//! (`0`, `false`, or a no-op). The log callback runs while the slot is
//! locked and must not call back into this API.
//!
//! # Example (C)
//! ```c
//! if (!tether_initialize("tether.toml", on_log)) return 1;
//!
//! const char* params[] = { "int", "int" };
//! tether_register_signature(10, "int", params, 2);
//!
//! int adder = tether_create_instance("Game.Adder, Scripts");
//! int add = tether_bind_instance_method(adder, "Add", 10);
//!
//! int a = 2, b = 3, sum = 0;
//! const void* args[] = { &a, &b };
//! tether_invoke(add, args, 2, &sum);   /* sum == 5 */
//!
//! tether_shutdown();
//! ```

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tether_core::{LogCallback, LogLevel, INVALID_HANDLE, INVALID_METHOD};
use tether_sdk::Assembly;
use tracing::error;

use crate::config::HostConfig;
use crate::host::{Host, HostError};

/// Caller log callback: `level` is 0 (trace) through 4 (error)
pub type TetherLogFn = Option<unsafe extern "C" fn(level: c_int, message: *const c_char)>;

static HOST: LazyLock<Mutex<Option<Host>>> = LazyLock::new(|| Mutex::new(None));

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

// ============================================================================
// Helper Functions
// ============================================================================

fn with_host<T>(fallback: T, f: impl FnOnce(&mut Host) -> T) -> T {
    match HOST.lock().as_mut() {
        Some(host) => f(host),
        None => fallback,
    }
}

/// Borrow a C string as UTF-8
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn report(host: &Host, operation: &str, message: &str) {
    host.bridge()
        .diagnostics()
        .log(LogLevel::Warn, &format!("{}: {}", operation, message));
}

/// Borrow a C string argument, reporting when it is null or not UTF-8
unsafe fn arg<'a>(host: &Host, operation: &str, name: &str, ptr: *const c_char) -> Option<&'a str> {
    let value = c_str(ptr);
    if value.is_none() {
        report(host, operation, &format!("{} is null or not valid UTF-8", name));
    }
    value
}

fn log_callback(log_fn: TetherLogFn) -> Option<LogCallback> {
    let log_fn = log_fn?;
    let callback: LogCallback = Arc::new(move |level: LogLevel, message: &str| {
        let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
        unsafe { log_fn(level.as_raw(), message.as_ptr()) };
    });
    Some(callback)
}

fn boot(config: Result<HostConfig, String>, log_fn: TetherLogFn) -> bool {
    let callback = log_callback(log_fn);
    let mut slot = HOST.lock();

    let result = if slot.is_some() {
        Err(Some("Runtime already initialized".to_string()))
    } else {
        config.map_err(Some).and_then(|config| {
            Host::boot(config, callback.clone()).map_err(|err| match err {
                // The bridge already reported through the installed callback
                HostError::Bridge(_) => None,
                err => Some(err.to_string()),
            })
        })
    };

    match result {
        Ok(host) => {
            *slot = Some(host);
            true
        }
        Err(Some(message)) => {
            error!("tether_initialize: {}", message);
            if let Some(callback) = callback {
                callback(LogLevel::Error, &format!("tether_initialize: {}", message));
            }
            false
        }
        Err(None) => false,
    }
}

/// Load an assembly linked into the host process.
///
/// For embedders that link their managed assemblies statically instead of
/// shipping them as shared libraries.
pub fn load_static_assembly(assembly: Assembly) -> bool {
    with_host(false, |host| host.load_assembly(assembly))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Boot the runtime from a TOML configuration file
///
/// # Arguments
/// * `config_path` - Path to the configuration file
/// * `log_fn` - Optional diagnostic callback
///
/// # Returns
/// * `true` on success
/// * `false` if the runtime is already initialized or booting failed
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_initialize(config_path: *const c_char, log_fn: TetherLogFn) -> bool {
    let config = c_str(config_path)
        .ok_or_else(|| "config path is null or not valid UTF-8".to_string())
        .and_then(|path| HostConfig::from_file(Path::new(path)).map_err(|e| e.to_string()));
    boot(config, log_fn)
}

/// Boot the runtime with the default configuration and no assemblies
#[no_mangle]
pub extern "C" fn tether_initialize_default(log_fn: TetherLogFn) -> bool {
    boot(Ok(HostConfig::default()), log_fn)
}

/// Shut the runtime down, dropping every instance, binding and assembly.
/// A no-op when the runtime is not initialized.
#[no_mangle]
pub extern "C" fn tether_shutdown() {
    let mut slot = HOST.lock();
    if let Some(host) = slot.take() {
        host.shutdown();
    }
}

/// Library version as a static NUL-terminated string
#[no_mangle]
pub extern "C" fn tether_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Assemblies
// ============================================================================

/// Load an assembly from a shared library
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_load_assembly(path: *const c_char) -> bool {
    with_host(false, |host| match arg(host, "tether_load_assembly", "path", path) {
        Some(path) => host.load_assembly_file(Path::new(path)),
        None => false,
    })
}

/// Replace a loaded assembly with the build at `path`
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_reload_assembly(path: *const c_char) -> bool {
    with_host(false, |host| match arg(host, "tether_reload_assembly", "path", path) {
        Some(path) => host.reload_assembly_file(Path::new(path)),
        None => false,
    })
}

/// Unload every assembly, clearing instances, bindings and signatures
#[no_mangle]
pub extern "C" fn tether_unload_assemblies() -> bool {
    with_host(false, |host| host.unload_assemblies())
}

// ============================================================================
// Signatures
// ============================================================================

/// Register a signature
///
/// # Arguments
/// * `id` - Non-negative signature id
/// * `return_type` - Return type name
/// * `param_types` - Array of `param_count` parameter type names
/// * `param_count` - Number of parameters
///
/// # Safety
/// Every string must be null or NUL-terminated; `param_types` must hold
/// `param_count` entries when `param_count > 0`.
#[no_mangle]
pub unsafe extern "C" fn tether_register_signature(
    id: c_int,
    return_type: *const c_char,
    param_types: *const *const c_char,
    param_count: c_int,
) -> bool {
    const OP: &str = "tether_register_signature";
    with_host(false, |host| {
        let Some(return_type) = arg(host, OP, "return type", return_type) else {
            return false;
        };
        let count = match usize::try_from(param_count) {
            Ok(count) => count,
            Err(_) => {
                report(host, OP, &format!("negative parameter count {}", param_count));
                return false;
            }
        };
        if count > 0 && param_types.is_null() {
            report(host, OP, "parameter array is null");
            return false;
        }

        let mut params = Vec::with_capacity(count);
        for i in 0..count {
            match arg(host, OP, "parameter type", *param_types.add(i)) {
                Some(param) => params.push(param),
                None => return false,
            }
        }
        host.register_signature(id, return_type, &params)
    })
}

// ============================================================================
// Instances
// ============================================================================

/// Default-construct an instance
///
/// # Returns
/// Non-zero handle on success, `0` on failure
///
/// # Safety
/// `type_name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_create_instance(type_name: *const c_char) -> c_int {
    with_host(INVALID_HANDLE, |host| {
        match arg(host, "tether_create_instance", "type name", type_name) {
            Some(type_name) => host.create_instance(type_name),
            None => INVALID_HANDLE,
        }
    })
}

/// Default-construct an instance under a caller-chosen key
///
/// # Safety
/// Both strings must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tether_create_instance_guid(
    type_name: *const c_char,
    key: *const c_char,
) -> bool {
    const OP: &str = "tether_create_instance_guid";
    with_host(false, |host| {
        match (arg(host, OP, "type name", type_name), arg(host, OP, "key", key)) {
            (Some(type_name), Some(key)) => host.create_instance_guid(type_name, key),
            _ => false,
        }
    })
}

/// Destroy an instance and invalidate its bindings
#[no_mangle]
pub extern "C" fn tether_destroy_instance(handle: c_int) {
    with_host((), |host| host.destroy_instance(handle));
}

/// Destroy a named instance and invalidate its bindings
///
/// # Safety
/// `key` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_destroy_instance_guid(key: *const c_char) {
    with_host((), |host| {
        if let Some(key) = arg(host, "tether_destroy_instance_guid", "key", key) {
            host.destroy_instance_guid(key);
        }
    });
}

// ============================================================================
// Binding
// ============================================================================

/// Bind an instance method
///
/// # Returns
/// Non-zero method id on success, `0` on failure
///
/// # Safety
/// `method` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tether_bind_instance_method(
    handle: c_int,
    method: *const c_char,
    signature: c_int,
) -> c_int {
    with_host(INVALID_METHOD, |host| {
        match arg(host, "tether_bind_instance_method", "method", method) {
            Some(method) => host.bind_instance_method(handle, method, signature),
            None => INVALID_METHOD,
        }
    })
}

/// Bind a method on a named instance
///
/// # Safety
/// Both strings must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tether_bind_instance_method_guid(
    key: *const c_char,
    method: *const c_char,
    signature: c_int,
) -> c_int {
    const OP: &str = "tether_bind_instance_method_guid";
    with_host(INVALID_METHOD, |host| {
        match (arg(host, OP, "key", key), arg(host, OP, "method", method)) {
            (Some(key), Some(method)) => host.bind_instance_method_guid(key, method, signature),
            _ => INVALID_METHOD,
        }
    })
}

/// Bind a static method
///
/// # Safety
/// Both strings must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tether_bind_static_method(
    type_name: *const c_char,
    method: *const c_char,
    signature: c_int,
) -> c_int {
    const OP: &str = "tether_bind_static_method";
    with_host(INVALID_METHOD, |host| {
        match (arg(host, OP, "type name", type_name), arg(host, OP, "method", method)) {
            (Some(type_name), Some(method)) => host.bind_static_method(type_name, method, signature),
            _ => INVALID_METHOD,
        }
    })
}

// ============================================================================
// Invocation
// ============================================================================

/// Invoke a bound method
///
/// # Arguments
/// * `method_id` - Id returned by a bind function
/// * `args` - Array of `arg_count` pointers, one per parameter
/// * `arg_count` - Must equal the bound signature's arity
/// * `ret` - Return buffer; required iff the return type is non-void
///
/// # Safety
/// Each `args[i]` must point to memory laid out as the i-th parameter type,
/// and `ret` must be writable for the return type's size.
#[no_mangle]
pub unsafe extern "C" fn tether_invoke(
    method_id: c_int,
    args: *const *const c_void,
    arg_count: c_int,
    ret: *mut c_void,
) -> bool {
    with_host(false, |host| host.invoke(method_id, args, arg_count, ret))
}
