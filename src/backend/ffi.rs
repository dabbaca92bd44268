//! The part of the libclang C API this crate uses, resolved at runtime.

#![allow(non_camel_case_types, non_snake_case, dead_code)]

use libloading::Library;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};
use std::path::Path;

pub type CXIndex = *mut c_void;
pub type CXTranslationUnit = *mut c_void;
pub type CXDiagnostic = *mut c_void;
pub type CXFile = *mut c_void;
pub type CXClientData = *mut c_void;
pub type CXCursorVisitor = extern "C" fn(CXCursor, CXCursor, CXClientData) -> c_int;

pub const CXChildVisit_Continue: c_int = 1;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CXString {
    data: *const c_void,
    private_flags: c_uint,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CXSourceLocation {
    ptr_data: [*const c_void; 2],
    int_data: c_uint,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CXSourceRange {
    ptr_data: [*const c_void; 2],
    begin_int_data: c_uint,
    end_int_data: c_uint,
}

impl CXSourceRange {
    pub fn null() -> Self {
        CXSourceRange {
            ptr_data: [std::ptr::null(); 2],
            begin_int_data: 0,
            end_int_data: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct CXCursor {
    kind: c_int,
    xdata: c_int,
    data: [*const c_void; 3],
}

#[repr(C)]
pub struct CXUnsavedFile {
    filename: *const c_char,
    contents: *const c_char,
    length: c_ulong,
}

macro_rules! entry_points {
    ($($name:ident: fn($($arg:ty),*) $(-> $ret:ty)?;)*) => {
        /// Function pointers into an open libclang.
        pub struct Api {
            $(pub $name: unsafe extern "C" fn($($arg),*) $(-> $ret)?,)*
        }

        impl Api {
            /// # Safety
            /// `library` must be a libclang whose exports match the declared signatures.
            unsafe fn load(library: &Library) -> Result<Api, String> {
                Ok(Api {
                    $($name: {
                        let symbol = unsafe {
                            library.get::<unsafe extern "C" fn($($arg),*) $(-> $ret)?>(
                                concat!(stringify!($name), "\0").as_bytes(),
                            )
                        }
                        .map_err(|e| format!("missing symbol {}: {e}", stringify!($name)))?;
                        *symbol
                    },)*
                })
            }
        }
    };
}

entry_points! {
    clang_createIndex: fn(c_int, c_int) -> CXIndex;
    clang_disposeIndex: fn(CXIndex);
    clang_parseTranslationUnit2: fn(
        CXIndex,
        *const c_char,
        *const *const c_char,
        c_int,
        *mut CXUnsavedFile,
        c_uint,
        c_uint,
        *mut CXTranslationUnit
    ) -> c_int;
    clang_disposeTranslationUnit: fn(CXTranslationUnit);
    clang_getNumDiagnostics: fn(CXTranslationUnit) -> c_uint;
    clang_getDiagnostic: fn(CXTranslationUnit, c_uint) -> CXDiagnostic;
    clang_disposeDiagnostic: fn(CXDiagnostic);
    clang_getDiagnosticSeverity: fn(CXDiagnostic) -> c_int;
    clang_getDiagnosticSpelling: fn(CXDiagnostic) -> CXString;
    clang_getDiagnosticLocation: fn(CXDiagnostic) -> CXSourceLocation;
    clang_getDiagnosticNumFixIts: fn(CXDiagnostic) -> c_uint;
    clang_getDiagnosticFixIt: fn(CXDiagnostic, c_uint, *mut CXSourceRange) -> CXString;
    clang_getRangeStart: fn(CXSourceRange) -> CXSourceLocation;
    clang_getRangeEnd: fn(CXSourceRange) -> CXSourceLocation;
    clang_getSpellingLocation: fn(
        CXSourceLocation,
        *mut CXFile,
        *mut c_uint,
        *mut c_uint,
        *mut c_uint
    );
    clang_Location_isFromMainFile: fn(CXSourceLocation) -> c_int;
    clang_getFileName: fn(CXFile) -> CXString;
    clang_getCString: fn(CXString) -> *const c_char;
    clang_disposeString: fn(CXString);
    clang_getTranslationUnitCursor: fn(CXTranslationUnit) -> CXCursor;
    clang_getCursorKind: fn(CXCursor) -> c_int;
    clang_getCursorKindSpelling: fn(c_int) -> CXString;
    clang_getCursorSpelling: fn(CXCursor) -> CXString;
    clang_getCursorLocation: fn(CXCursor) -> CXSourceLocation;
    clang_visitChildren: fn(CXCursor, CXCursorVisitor, CXClientData) -> c_uint;
}

/// An open libclang. The library stays mapped for as long as this lives.
pub struct LibClang {
    pub api: Api,
    _library: Library,
}

impl LibClang {
    pub fn open(path: &Path) -> Result<LibClang, String> {
        // SAFETY: loading libclang runs no initialisers beyond its own static setup.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        // SAFETY: the declared signatures follow clang-c/Index.h.
        let api = unsafe { Api::load(&library) }?;
        Ok(LibClang {
            api,
            _library: library,
        })
    }

    /// Copy a `CXString` into an owned `String` and release it.
    pub fn take_string(&self, s: CXString) -> String {
        // SAFETY: `s` came from this library and is disposed exactly once here.
        unsafe {
            let ptr = (self.api.clang_getCString)(s);
            let out = if ptr.is_null() {
                String::new()
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            };
            (self.api.clang_disposeString)(s);
            out
        }
    }
}
