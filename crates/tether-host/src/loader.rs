//! Shared library loading for managed assemblies
//!
//! An assembly library exports `tether_assembly_init`, which hands the host
//! a heap-allocated [`Assembly`]. The [`Library`] must outlive every object
//! and binding created from that assembly, since their code lives in it.

use std::ffi::{c_void, CString};
use std::path::Path;

use tether_sdk::{Assembly, ASSEMBLY_INIT_SYMBOL};
use thiserror::Error;

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be opened
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the platform error
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// `tether_assembly_init` returned null
    #[error("Assembly initialization failed in {0}")]
    InvalidInit(String),

    /// Path is not valid UTF-8 or contains a NUL byte
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// An open shared library
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Open a shared library.
    ///
    /// Uses `dlopen(RTLD_NOW | RTLD_LOCAL)` on Unix and `LoadLibraryW` on
    /// Windows.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Get a function pointer by name.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the symbol's actual
    /// signature, and the library must stay loaded while it is used.
    pub unsafe fn get<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        let raw = self.handle.symbol(symbol, &self.path)?;
        Ok(std::mem::transmute_copy(&raw))
    }

    /// Call `tether_assembly_init` and take ownership of the returned assembly.
    ///
    /// The library must be built against the same `tether-sdk` as the host.
    pub fn load_assembly(&self) -> Result<Assembly, LoadError> {
        type InitFn = extern "C" fn() -> *mut Assembly;

        unsafe {
            let init: InitFn = self.get(ASSEMBLY_INIT_SYMBOL)?;
            let assembly = init();
            if assembly.is_null() {
                return Err(LoadError::InvalidInit(self.path.clone()));
            }
            Ok(*Box::from_raw(assembly))
        }
    }

    /// Path this library was opened from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path).map_err(|_| LoadError::InvalidPath(path.to_string()))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    unsafe fn symbol(&self, name: &str, lib_path: &str) -> Result<*mut c_void, LoadError> {
        let c_name = CString::new(name).map_err(|_| LoadError::SymbolNotFound {
            symbol: name.to_string(),
            library: lib_path.to_string(),
        })?;

        // Clear any stale error before the lookup
        libc::dlerror();
        let symbol = libc::dlsym(self.handle, c_name.as_ptr());
        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, last_dl_error()),
            });
        }
        Ok(symbol)
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    unsafe fn symbol(&self, name: &str, lib_path: &str) -> Result<*mut c_void, LoadError> {
        let c_name = CString::new(name).map_err(|_| LoadError::SymbolNotFound {
            symbol: name.to_string(),
            library: lib_path.to_string(),
        })?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());
        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, GetLastError()),
            });
        }
        Ok(symbol)
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut c_void;
    fn GetProcAddress(module: *mut c_void, procname: *const std::os::raw::c_char) -> *mut c_void;
    fn FreeLibrary(module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}
