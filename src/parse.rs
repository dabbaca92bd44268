//! Parses one C++ file per call into a [`ParsedUnit`].
//!
//! A unit that libclang produced is always returned, even when its diagnostics
//! contain errors: the code generator wants whatever AST survived. Only when
//! libclang produces no unit at all is the parse a failure.

use crate::backend::Backend;
use crate::backend::ffi::{
    CXChildVisit_Continue, CXClientData, CXCursor, CXDiagnostic, CXIndex, CXSourceLocation,
    CXSourceRange, CXTranslationUnit, LibClang,
};
use crate::diagnostics::{self, Diagnostic, FixIt, Severity, SourceLocation};
use crate::error::{ClangError, Result};
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uint};
use std::path::{Path, PathBuf};
use std::sync::Arc;

bitflags::bitflags! {
    /// How much of the AST libclang keeps. Values are libclang's own
    /// `CXTranslationUnit_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParseOptions: u32 {
        /// Keep macro expansion and inclusion records.
        const DETAILED_PREPROCESSING_RECORD = 0x01;
        /// Tolerate unresolved includes.
        const INCOMPLETE = 0x02;
        /// Skip function bodies for declaration-only analysis.
        const SKIP_FUNCTION_BODIES = 0x40;
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions::DETAILED_PREPROCESSING_RECORD | ParseOptions::SKIP_FUNCTION_BODIES
    }
}

/// Parses files against a configured backend.
pub struct Session {
    backend: Backend,
}

impl Session {
    pub fn new(backend: Backend) -> Self {
        Session { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// `args` are handed to clang verbatim (`-std=c++17`, `-DFOO`, `-I...`).
    pub fn parse(&self, path: &Path, args: &[String], options: ParseOptions) -> Result<ParsedUnit> {
        if !path.is_file() {
            return Err(ClangError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        log::debug!("parse_file: {}: args={args:?} options={options:?}", path.display());

        let library = self.backend.library()?;
        let failed = |reason: String| parse_failure(path, reason, &[]);

        let c_path =
            path_to_cstring(path).ok_or_else(|| failed(String::from("path contains a NUL byte")))?;
        let c_args = args
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed(format!("argument contains a NUL byte: {e}")))?;
        let argv: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();

        log::debug!("creating index...");
        // SAFETY: plain constructor; disposed by `ParsedUnit` or below on failure.
        let index = unsafe { (library.api.clang_createIndex)(0, 0) };
        if index.is_null() {
            return Err(failed(String::from("clang_createIndex returned null")));
        }

        log::debug!("starting parse");
        let mut tu: CXTranslationUnit = std::ptr::null_mut();
        // SAFETY: every pointer outlives the call; `tu` is only read if the call fills it.
        let code = unsafe {
            (library.api.clang_parseTranslationUnit2)(
                index,
                c_path.as_ptr(),
                argv.as_ptr(),
                argv.len() as c_int,
                std::ptr::null_mut(),
                0,
                options.bits() as c_uint,
                &mut tu,
            )
        };
        log::debug!("finished parse");

        if code != 0 || tu.is_null() {
            let reason = format!("libclang returned {}", error_code_name(code));
            let mut leftover = Vec::new();
            // SAFETY: `tu` is only non-null if libclang produced it; the index is ours.
            unsafe {
                if !tu.is_null() {
                    leftover = collect_diagnostics(&library, tu);
                    (library.api.clang_disposeTranslationUnit)(tu);
                }
                (library.api.clang_disposeIndex)(index);
            }
            return Err(parse_failure(path, reason, &leftover));
        }

        let unit = ParsedUnit::new(library, index, tu, path.to_path_buf());
        if !unit.diagnostics.is_empty() {
            log::debug!(
                "{}: parse diagnostics:\n{}",
                path.display(),
                diagnostics::render(&unit.diagnostics)
            );
        }
        Ok(unit)
    }
}

/// Whatever diagnostics libclang left behind are rendered into the error.
fn parse_failure(path: &Path, reason: String, leftover: &[Diagnostic]) -> ClangError {
    ClangError::ParseFailed {
        file: path.to_path_buf(),
        reason,
        diagnostics: diagnostics::render(leftover),
    }
}

/// libclang takes the path as raw bytes; on Unix they are passed through untouched.
#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Option<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).ok()
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Option<CString> {
    CString::new(path.to_string_lossy().as_bytes()).ok()
}

fn error_code_name(code: c_int) -> String {
    match code {
        0 => String::from("CXError_Success without a translation unit"),
        1 => String::from("CXError_Failure"),
        2 => String::from("CXError_Crashed"),
        3 => String::from("CXError_InvalidArguments"),
        4 => String::from("CXError_ASTReadError"),
        other => format!("unknown error code {other}"),
    }
}

/// A parsed translation unit and the diagnostics clang emitted for it.
/// Owns the libclang index and unit; both are released on drop.
pub struct ParsedUnit {
    library: Arc<LibClang>,
    index: CXIndex,
    tu: CXTranslationUnit,
    file: PathBuf,
    diagnostics: Vec<Diagnostic>,
}

impl ParsedUnit {
    fn new(library: Arc<LibClang>, index: CXIndex, tu: CXTranslationUnit, file: PathBuf) -> Self {
        let diagnostics = collect_diagnostics(&library, tu);
        ParsedUnit {
            library,
            index,
            tu,
            file,
            diagnostics,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity.is_error())
    }

    /// The translation unit cursor.
    pub fn root(&self) -> Entity<'_> {
        // SAFETY: `tu` is alive for as long as `self`.
        let cursor = unsafe { (self.library.api.clang_getTranslationUnitCursor)(self.tu) };
        Entity::new(self, cursor)
    }
}

impl Drop for ParsedUnit {
    fn drop(&mut self) {
        // SAFETY: both handles were created for this unit and are released once.
        unsafe {
            (self.library.api.clang_disposeTranslationUnit)(self.tu);
            (self.library.api.clang_disposeIndex)(self.index);
        }
    }
}

impl std::fmt::Debug for ParsedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ParsedUnit")
            .field("file", &self.file)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// A node of the AST, borrowed from its [`ParsedUnit`].
#[derive(Clone, Copy)]
pub struct Entity<'unit> {
    unit: &'unit ParsedUnit,
    cursor: CXCursor,
}

impl<'unit> Entity<'unit> {
    fn new(unit: &'unit ParsedUnit, cursor: CXCursor) -> Self {
        Entity { unit, cursor }
    }

    fn library(&self) -> &LibClang {
        &self.unit.library
    }

    /// Raw `CXCursorKind`.
    pub fn kind(&self) -> i32 {
        // SAFETY: cursor belongs to a live unit.
        unsafe { (self.library().api.clang_getCursorKind)(self.cursor) }
    }

    pub fn kind_name(&self) -> String {
        let library = self.library();
        // SAFETY: kind spelling is a static lookup.
        library.take_string(unsafe { (library.api.clang_getCursorKindSpelling)(self.kind()) })
    }

    pub fn spelling(&self) -> String {
        let library = self.library();
        // SAFETY: cursor belongs to a live unit.
        library.take_string(unsafe { (library.api.clang_getCursorSpelling)(self.cursor) })
    }

    pub fn location(&self) -> Option<SourceLocation> {
        let library = self.library();
        // SAFETY: cursor belongs to a live unit.
        let location = unsafe { (library.api.clang_getCursorLocation)(self.cursor) };
        spelling_location(library, location)
    }

    pub fn is_in_main_file(&self) -> bool {
        let library = self.library();
        // SAFETY: cursor belongs to a live unit.
        unsafe {
            let location = (library.api.clang_getCursorLocation)(self.cursor);
            (library.api.clang_Location_isFromMainFile)(location) != 0
        }
    }

    /// Direct children, in source order.
    pub fn children(&self) -> Vec<Entity<'unit>> {
        extern "C" fn collect(cursor: CXCursor, _parent: CXCursor, data: CXClientData) -> c_int {
            // SAFETY: `data` is the `Vec` passed to `clang_visitChildren` below.
            let children = unsafe { &mut *(data as *mut Vec<CXCursor>) };
            children.push(cursor);
            CXChildVisit_Continue
        }

        let mut cursors: Vec<CXCursor> = Vec::new();
        // SAFETY: the visitor only runs during this call, while `cursors` is borrowed.
        unsafe {
            (self.library().api.clang_visitChildren)(
                self.cursor,
                collect,
                &mut cursors as *mut Vec<CXCursor> as CXClientData,
            );
        }
        cursors
            .into_iter()
            .map(|cursor| Entity::new(self.unit, cursor))
            .collect()
    }
}

impl std::fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind_name())
            .field("spelling", &self.spelling())
            .field("location", &self.location())
            .finish()
    }
}

fn collect_diagnostics(library: &LibClang, tu: CXTranslationUnit) -> Vec<Diagnostic> {
    // SAFETY: `tu` is a live unit.
    let count = unsafe { (library.api.clang_getNumDiagnostics)(tu) };
    (0..count)
        .map(|i| {
            // SAFETY: `i` is in range; the diagnostic is released right after conversion.
            unsafe {
                let raw = (library.api.clang_getDiagnostic)(tu, i);
                let diagnostic = convert_diagnostic(library, raw);
                (library.api.clang_disposeDiagnostic)(raw);
                diagnostic
            }
        })
        .collect()
}

/// # Safety
/// `raw` must be a live diagnostic from `library`.
unsafe fn convert_diagnostic(library: &LibClang, raw: CXDiagnostic) -> Diagnostic {
    let api = &library.api;
    let severity = match unsafe { (api.clang_getDiagnosticSeverity)(raw) } {
        2 => Severity::Warning,
        3 => Severity::Error,
        4 => Severity::Fatal,
        _ => Severity::Note,
    };
    let message = library.take_string(unsafe { (api.clang_getDiagnosticSpelling)(raw) });
    let location = spelling_location(library, unsafe { (api.clang_getDiagnosticLocation)(raw) });

    let fixit_count = unsafe { (api.clang_getDiagnosticNumFixIts)(raw) };
    let fixits = (0..fixit_count)
        .map(|i| {
            let mut range = CXSourceRange::null();
            let replacement =
                library.take_string(unsafe { (api.clang_getDiagnosticFixIt)(raw, i, &mut range) });
            let start = spelling_location(library, unsafe { (api.clang_getRangeStart)(range) });
            let end = spelling_location(library, unsafe { (api.clang_getRangeEnd)(range) });
            FixIt {
                range: start.zip(end),
                replacement,
            }
        })
        .collect();

    Diagnostic {
        severity,
        message,
        location,
        fixits,
    }
}

/// `None` for locations with no file (command line, built-ins).
fn spelling_location(library: &LibClang, location: CXSourceLocation) -> Option<SourceLocation> {
    let mut file = std::ptr::null_mut();
    let mut line: c_uint = 0;
    let mut column: c_uint = 0;
    // SAFETY: out-pointers are valid locals; the offset is not requested.
    unsafe {
        (library.api.clang_getSpellingLocation)(
            location,
            &mut file,
            &mut line,
            &mut column,
            std::ptr::null_mut(),
        );
    }
    if file.is_null() {
        return None;
    }
    // SAFETY: `file` was just produced by libclang.
    let name = library.take_string(unsafe { (library.api.clang_getFileName)(file) });
    Some(SourceLocation {
        file: name,
        line,
        column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendSlot, library_filename};
    use std::fs;

    #[test]
    fn default_options_keep_records_and_skip_bodies() {
        let options = ParseOptions::default();
        assert!(options.contains(ParseOptions::DETAILED_PREPROCESSING_RECORD));
        assert!(options.contains(ParseOptions::SKIP_FUNCTION_BODIES));
        assert!(!options.contains(ParseOptions::INCOMPLETE));
        assert_eq!(options.bits(), 0x41);
    }

    #[test]
    fn options_compose_by_union() {
        let options = ParseOptions::default() | ParseOptions::INCOMPLETE;
        assert_eq!(options.bits(), 0x43);
    }

    #[test]
    fn missing_file_fails_before_the_backend_is_touched() {
        // The "library" here is an empty file; opening it would fail with LibraryLoad.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(library_filename()), b"").unwrap();
        let backend = BackendSlot::new().configure(dir.path()).unwrap();
        let session = Session::new(backend);

        let missing = dir.path().join("does_not_exist.cpp");
        let err = session.parse(&missing, &[], ParseOptions::default()).unwrap_err();

        match err {
            ClangError::FileNotFound { path } => assert_eq!(path, missing),
            other => panic!("expected FileNotFound, got {other}"),
        }
        assert!(!session.backend().is_loaded());
    }

    #[test]
    fn unloadable_backend_surfaces_as_library_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(library_filename()), b"").unwrap();
        let source = dir.path().join("widget.hpp");
        fs::write(&source, "struct Widget {};\n").unwrap();
        let backend = BackendSlot::new().configure(dir.path()).unwrap();

        let err = Session::new(backend)
            .parse(&source, &[], ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClangError::LibraryLoad { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_reach_libclang_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(std::ffi::OsStr::from_bytes(b"/tmp/caf\xE9.cpp"));
        let c_path = path_to_cstring(path).unwrap();
        assert_eq!(c_path.as_bytes(), b"/tmp/caf\xE9.cpp");
    }

    #[test]
    fn nul_in_path_is_rejected() {
        assert!(path_to_cstring(Path::new("a\0b.cpp")).is_none());
    }

    #[test]
    fn failure_carries_leftover_diagnostics() {
        let leftover = [Diagnostic {
            severity: Severity::Fatal,
            message: String::from("too many errors emitted"),
            location: Some(SourceLocation {
                file: String::from("widget.hpp"),
                line: 9,
                column: 1,
            }),
            fixits: Vec::new(),
        }];
        let err = parse_failure(
            Path::new("widget.hpp"),
            String::from("libclang returned CXError_Failure"),
            &leftover,
        );

        match &err {
            ClangError::ParseFailed { diagnostics, .. } => {
                assert_eq!(diagnostics, "widget.hpp:9: fatal: too many errors emitted\n\n")
            }
            other => panic!("expected ParseFailed, got {other}"),
        }
        assert!(err.to_string().contains("widget.hpp:9: fatal: too many errors emitted"));
    }

    #[test]
    fn error_codes_have_names() {
        assert_eq!(error_code_name(1), "CXError_Failure");
        assert_eq!(error_code_name(4), "CXError_ASTReadError");
        assert_eq!(error_code_name(42), "unknown error code 42");
    }
}
