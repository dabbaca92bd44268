//! Locates the directory holding libclang.
//!
//! Sources are tried in a fixed priority order and the first one that yields a
//! directory wins. A source that fails (a broken `llvm-config`, a driver whose
//! version can't be read) is logged and skipped; only when every source is
//! exhausted does the locator give up, and it never guesses a path.

pub mod host;
pub mod probes;

use crate::backend;
use crate::error::{ClangError, ProbeAttempt, Result};
use host::{Host, SystemHost};
use probes::{ExplicitDirProbe, Probe};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainSource {
    Explicit,
    LibclangPath,
    LlvmLibDir,
    LlvmConfig,
    ClangDriver,
    WindowsClangDriver,
}

impl ToolchainSource {
    pub fn label(self) -> &'static str {
        match self {
            ToolchainSource::Explicit => "explicit directory",
            ToolchainSource::LibclangPath => probes::LIBCLANG_PATH_VAR,
            ToolchainSource::LlvmLibDir => probes::LLVM_LIB_DIR_VAR,
            ToolchainSource::LlvmConfig => "llvm-config",
            ToolchainSource::ClangDriver => "clang++",
            ToolchainSource::WindowsClangDriver => "clang++ (windows)",
        }
    }
}

impl fmt::Display for ToolchainSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A discovered compiler installation. Built once by the locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainHandle {
    pub source: ToolchainSource,
    pub executable: Option<PathBuf>,
    pub version: Option<String>,
    pub library_dir: PathBuf,
    /// Not checked for existence here; the loader does that.
    pub library_file: PathBuf,
}

pub struct Locator<H: Host> {
    host: H,
    probes: Vec<Box<dyn Probe>>,
}

impl Locator<SystemHost> {
    pub fn system() -> Self {
        Locator::new(SystemHost::default())
    }
}

impl<H: Host> Locator<H> {
    pub fn new(host: H) -> Self {
        Locator {
            host,
            probes: probes::default_probes(),
        }
    }

    pub fn with_probes(host: H, probes: Vec<Box<dyn Probe>>) -> Self {
        Locator { host, probes }
    }

    /// A caller-supplied directory outranks every other source.
    pub fn with_explicit_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.probes.insert(0, Box::new(ExplicitDirProbe(dir)));
        }
        self
    }

    pub fn locate(&self) -> Result<ToolchainHandle> {
        self.log_environment();

        let mut attempts = Vec::new();
        for probe in &self.probes {
            let source = probe.source();
            log::debug!("looking for libclang: trying {source}");
            match probe.probe(&self.host) {
                Ok(Some(found)) => {
                    log::debug!(
                        "looking for libclang: {source} gave {}",
                        found.library_dir.display()
                    );
                    let library_file = found.library_dir.join(backend::library_filename());
                    return Ok(ToolchainHandle {
                        source,
                        executable: found.executable,
                        version: found.version,
                        library_dir: found.library_dir,
                        library_file,
                    });
                }
                Ok(None) => {
                    let reason = probe.unavailable();
                    log::debug!("looking for libclang: {source}: {reason}");
                    attempts.push(ProbeAttempt {
                        source: source.label(),
                        reason,
                    });
                }
                Err(err) => {
                    log::warn!(
                        "looking for libclang: {source} failed, trying the next source: {err}"
                    );
                    attempts.push(ProbeAttempt {
                        source: source.label(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(ClangError::DiscoveryExhausted { attempts })
    }

    fn log_environment(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for key in [
            "PATH",
            "LD_LIBRARY_PATH",
            probes::LIBCLANG_PATH_VAR,
            probes::LLVM_LIB_DIR_VAR,
        ] {
            let value = self.host.env_var(key).unwrap_or_default();
            log::debug!("{key}={}", value.to_string_lossy());
        }
    }
}
