//! Discovery sources, tried by the locator in the order `default_probes` returns them.

use super::ToolchainSource;
use super::host::{Host, ProbeError};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const LIBCLANG_PATH_VAR: &str = "LIBCLANG_PATH";
pub const LLVM_LIB_DIR_VAR: &str = "LLVM_LIB_DIR";

const LLVM_CONFIG: &str = "llvm-config";
const CLANGXX: &str = "clang++";

/// What a successful probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub library_dir: PathBuf,
    pub executable: Option<PathBuf>,
    pub version: Option<String>,
}

impl Discovery {
    fn directory(library_dir: PathBuf) -> Self {
        Discovery {
            library_dir,
            executable: None,
            version: None,
        }
    }
}

/// One discovery source. `Ok(None)` means the source is not present on this host.
pub trait Probe {
    fn source(&self) -> ToolchainSource;

    /// Shown in the discovery error when the probe returns `Ok(None)`.
    fn unavailable(&self) -> String;

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError>;
}

/// The priority order used when no explicit directory is given.
pub fn default_probes() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(LibclangPathProbe),
        Box::new(LlvmLibDirProbe),
        Box::new(LlvmConfigProbe),
        Box::new(ClangDriverProbe),
        Box::new(WindowsClangDriverProbe),
    ]
}

/// A directory handed in by the caller.
pub struct ExplicitDirProbe(pub PathBuf);

impl Probe for ExplicitDirProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::Explicit
    }

    fn unavailable(&self) -> String {
        String::from("no directory given")
    }

    fn probe(&self, _host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        if self.0.as_os_str().is_empty() {
            return Ok(None);
        }
        Ok(Some(Discovery::directory(self.0.clone())))
    }
}

pub struct LibclangPathProbe;

impl Probe for LibclangPathProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::LibclangPath
    }

    fn unavailable(&self) -> String {
        format!("{LIBCLANG_PATH_VAR} is not set")
    }

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        Ok(non_empty_var(host, LIBCLANG_PATH_VAR)
            .map(|dir| Discovery::directory(PathBuf::from(dir))))
    }
}

/// `LLVM_LIB_DIR` names the install root; the library lives in its `bin`.
pub struct LlvmLibDirProbe;

impl Probe for LlvmLibDirProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::LlvmLibDir
    }

    fn unavailable(&self) -> String {
        format!("{LLVM_LIB_DIR_VAR} is not set")
    }

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        Ok(non_empty_var(host, LLVM_LIB_DIR_VAR)
            .map(|root| Discovery::directory(PathBuf::from(root).join("bin"))))
    }
}

pub struct LlvmConfigProbe;

impl Probe for LlvmConfigProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::LlvmConfig
    }

    fn unavailable(&self) -> String {
        format!("'{LLVM_CONFIG}' not found in PATH")
    }

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        let Some(exe) = host.find_executable(LLVM_CONFIG) else {
            return Ok(None);
        };
        log::debug!("'{LLVM_CONFIG}' found: {}", exe.display());

        // A tool that cannot even report its version is not trusted for paths.
        let raw_version = host.run(&exe, &["--version"])?;
        let version =
            parse_plain_version(&raw_version).ok_or_else(|| ProbeError::UnparseableVersion {
                program: exe.clone(),
                output: raw_version.clone(),
            })?;
        log::debug!("'{LLVM_CONFIG}' version: {version}");

        // libclang.dll sits next to the executables on Windows.
        let flag = if host.is_windows() { "--bindir" } else { "--libdir" };
        let dir = host.run(&exe, &[flag])?;
        let dir = dir.lines().next().unwrap_or_default().trim();
        if dir.is_empty() {
            return Err(ProbeError::ToolFailed {
                command: format!("{} {flag}", exe.display()),
                status: String::from("exit status: 0"),
                output: String::from("<empty>"),
            });
        }
        log::debug!("result for '{} {flag}': {dir}", exe.display());

        Ok(Some(Discovery {
            library_dir: PathBuf::from(dir),
            executable: Some(exe),
            version: Some(version),
        }))
    }
}

/// `clang++` on PATH; the library is in the install prefix's `lib`.
pub struct ClangDriverProbe;

impl Probe for ClangDriverProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::ClangDriver
    }

    fn unavailable(&self) -> String {
        format!("'{CLANGXX}' not found in PATH (or running on Windows)")
    }

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        if host.is_windows() {
            return Ok(None);
        }
        let Some(exe) = host.find_executable(CLANGXX) else {
            return Ok(None);
        };
        log::debug!("'{CLANGXX}' found: {}", exe.display());

        let full_version = host.run(&exe, &["--version"])?;
        log::debug!("'{CLANGXX}' full version:\n{full_version}");
        let version =
            parse_driver_version(&full_version).ok_or_else(|| ProbeError::UnparseableVersion {
                program: exe.clone(),
                output: full_version.lines().next().unwrap_or_default().to_string(),
            })?;

        let library_dir = install_prefix(&exe)
            .map(|prefix| prefix.join("lib"))
            .ok_or_else(|| ProbeError::Layout {
                program: exe.clone(),
                reason: String::from("driver path has no parent directory"),
            })?;

        Ok(Some(Discovery {
            library_dir,
            executable: Some(exe),
            version: Some(version),
        }))
    }
}

/// A vanilla Windows install keeps libclang.dll beside `clang++.exe`.
pub struct WindowsClangDriverProbe;

impl Probe for WindowsClangDriverProbe {
    fn source(&self) -> ToolchainSource {
        ToolchainSource::WindowsClangDriver
    }

    fn unavailable(&self) -> String {
        format!("'{CLANGXX}' not found in PATH (or not running on Windows)")
    }

    fn probe(&self, host: &dyn Host) -> Result<Option<Discovery>, ProbeError> {
        if !host.is_windows() {
            return Ok(None);
        }
        let Some(exe) = host.find_executable(CLANGXX) else {
            return Ok(None);
        };
        let Some(dir) = exe.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(None);
        };
        log::debug!("in windows: assuming library dir {}", dir.display());

        Ok(Some(Discovery {
            library_dir: dir.to_path_buf(),
            executable: Some(exe.clone()),
            version: None,
        }))
    }
}

/// Empty or whitespace-only values count as unset. Non-UTF-8 values are kept as-is.
fn non_empty_var(host: &dyn Host, key: &str) -> Option<OsString> {
    host.env_var(key).filter(|value| match value.to_str() {
        Some(text) => !text.trim().is_empty(),
        None => !value.is_empty(),
    })
}

/// `llvm-config --version` prints a bare version such as `17.0.6`.
pub fn parse_plain_version(output: &str) -> Option<String> {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    let re = PLAIN.get_or_init(|| Regex::new(r"^\s*(\d+\.\d+)").expect("valid version regex"));
    let first_line = output.lines().next()?;
    re.captures(first_line).map(|c| c[1].to_string())
}

/// First line of `clang++ --version`, e.g. `Ubuntu clang version 14.0.0-1ubuntu1`.
pub fn parse_driver_version(output: &str) -> Option<String> {
    static DRIVER: OnceLock<Regex> = OnceLock::new();
    let re = DRIVER.get_or_init(|| Regex::new(r"version (\d+\.\d+)").expect("valid version regex"));
    let first_line = output.lines().next()?;
    re.captures(first_line).map(|c| c[1].to_string())
}

/// `<prefix>/bin/clang++` -> `<prefix>`, following symlinks such as
/// `/usr/bin/clang++ -> /usr/lib/llvm-14/bin/clang++`.
fn install_prefix(exe: &Path) -> Option<PathBuf> {
    let resolved = std::fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf());
    let bin_dir = resolved.parent().filter(|d| !d.as_os_str().is_empty())?;
    Some(bin_dir.parent().unwrap_or(bin_dir).to_path_buf())
}
