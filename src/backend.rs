//! Binds the process to one libclang binary.
//!
//! libclang is process-global once it starts parsing, so the library file is
//! committed at most once per process: configuring again with the same file
//! hands back the same backend; asking for another file is refused. Callers
//! that configure from several threads must serialise those calls themselves.

pub mod ffi;

use crate::error::{ClangError, Result};
use crate::toolchain::ToolchainHandle;
use ffi::LibClang;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static GLOBAL: BackendSlot = BackendSlot::new();

/// Platform file name of the libclang shared library.
pub fn library_filename() -> &'static str {
    if cfg!(target_os = "windows") {
        "libclang.dll"
    } else if cfg!(target_os = "macos") {
        "libclang.dylib"
    } else {
        "libclang.so"
    }
}

/// Configure the process-wide backend from a library directory.
pub fn configure(library_dir: &Path) -> Result<Backend> {
    GLOBAL.configure(library_dir)
}

pub fn configure_toolchain(toolchain: &ToolchainHandle) -> Result<Backend> {
    GLOBAL.configure(&toolchain.library_dir)
}

/// The backend configured for this process, if any.
pub fn current() -> Option<Backend> {
    GLOBAL.current()
}

/// Holds at most one configured backend.
pub struct BackendSlot {
    active: OnceLock<Backend>,
}

impl Default for BackendSlot {
    fn default() -> Self {
        BackendSlot::new()
    }
}

impl BackendSlot {
    pub const fn new() -> Self {
        BackendSlot {
            active: OnceLock::new(),
        }
    }

    pub fn configure(&self, library_dir: &Path) -> Result<Backend> {
        let library_file = library_dir.join(library_filename());
        log::debug!("loading libclang: testing {}", library_file.display());
        if !library_file.is_file() {
            log::debug!("loading libclang: lib not found!");
            return Err(ClangError::LibraryNotFound { path: library_file });
        }
        let requested = std::fs::canonicalize(&library_file).unwrap_or(library_file);

        let backend = self.active.get_or_init(|| {
            log::debug!("loading libclang: using {}", requested.display());
            Backend::new(requested.clone())
        });
        if backend.library_file() != requested {
            return Err(ClangError::BackendConflict {
                active: backend.library_file().to_path_buf(),
                requested,
            });
        }
        Ok(backend.clone())
    }

    pub fn current(&self) -> Option<Backend> {
        self.active.get().cloned()
    }
}

struct Inner {
    library_file: PathBuf,
    library: OnceLock<Result<Arc<LibClang>, String>>,
}

/// Handle to the configured libclang. Cheap to clone; the library itself is
/// opened on first use and stays open for the life of the process.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<Inner>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Backend")
            .field("library_file", &self.inner.library_file)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Backend {
    fn new(library_file: PathBuf) -> Self {
        Backend {
            inner: Arc::new(Inner {
                library_file,
                library: OnceLock::new(),
            }),
        }
    }

    pub fn library_file(&self) -> &Path {
        &self.inner.library_file
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.inner.library.get(), Some(Ok(_)))
    }

    pub fn same_as(&self, other: &Backend) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Open libclang now instead of on the first parse.
    pub fn load(&self) -> Result<()> {
        self.library().map(|_| ())
    }

    pub(crate) fn library(&self) -> Result<Arc<LibClang>> {
        let loaded = self.inner.library.get_or_init(|| {
            log::debug!("opening {}", self.inner.library_file.display());
            LibClang::open(&self.inner.library_file).map(Arc::new)
        });
        match loaded {
            Ok(library) => Ok(Arc::clone(library)),
            Err(reason) => Err(ClangError::LibraryLoad {
                path: self.inner.library_file.clone(),
                reason: reason.clone(),
            }),
        }
    }
}
