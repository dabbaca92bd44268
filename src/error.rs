use std::fmt;
use std::path::PathBuf;

/// Why a single discovery source did not produce a library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub source: &'static str,
    pub reason: String,
}

/// Errors surfaced to callers of the locator, loader and parse session.
#[derive(Debug, Clone)]
pub enum ClangError {
    /// No discovery source yielded a library directory.
    DiscoveryExhausted { attempts: Vec<ProbeAttempt> },
    /// The resolved directory does not contain the expected libclang binary.
    LibraryNotFound { path: PathBuf },
    /// The libclang binary exists but could not be opened or is missing symbols.
    LibraryLoad { path: PathBuf, reason: String },
    /// The backend was already configured with another library file.
    BackendConflict { active: PathBuf, requested: PathBuf },
    /// The requested source file does not exist.
    FileNotFound { path: PathBuf },
    /// libclang did not produce a translation unit at all.
    ParseFailed {
        file: PathBuf,
        reason: String,
        /// Rendered diagnostics from a partial unit, if libclang left one behind.
        /// Usually empty: without a unit there is nothing to ask for diagnostics.
        diagnostics: String,
    },
}

impl fmt::Display for ClangError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClangError::DiscoveryExhausted { attempts } => {
                write!(f, "could not find a suitable libclang directory")?;
                if attempts.is_empty() {
                    return Ok(());
                }
                write!(f, "; tried:")?;
                for attempt in attempts {
                    write!(f, "\n  {}: {}", attempt.source, attempt.reason)?;
                }
                Ok(())
            }
            ClangError::LibraryNotFound { path } => {
                write!(f, "libclang not found: {}", path.display())
            }
            ClangError::LibraryLoad { path, reason } => {
                write!(f, "failed to load libclang from {}: {reason}", path.display())
            }
            ClangError::BackendConflict { active, requested } => write!(
                f,
                "libclang is already configured as {}, refusing to switch to {}",
                active.display(),
                requested.display()
            ),
            ClangError::FileNotFound { path } => {
                write!(f, "file not found: {}", path.display())
            }
            ClangError::ParseFailed {
                file,
                reason,
                diagnostics,
            } => write!(f, "{}: parse error: {reason}\n{diagnostics}", file.display()),
        }
    }
}

impl std::error::Error for ClangError {}

pub type Result<T, E = ClangError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_lists_every_attempt() {
        let err = ClangError::DiscoveryExhausted {
            attempts: vec![
                ProbeAttempt {
                    source: "LIBCLANG_PATH",
                    reason: String::from("not set"),
                },
                ProbeAttempt {
                    source: "llvm-config",
                    reason: String::from("not found in PATH"),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("LIBCLANG_PATH: not set"));
        assert!(message.contains("llvm-config: not found in PATH"));
    }

    #[test]
    fn parse_failure_embeds_diagnostics() {
        let err = ClangError::ParseFailed {
            file: PathBuf::from("a.cpp"),
            reason: String::from("libclang returned CXError_Failure"),
            diagnostics: String::from("a.cpp:1: fatal: boom\n"),
        };

        let message = err.to_string();
        assert!(message.starts_with("a.cpp: parse error: libclang returned CXError_Failure"));
        assert!(message.contains("a.cpp:1: fatal: boom"));
    }
}
