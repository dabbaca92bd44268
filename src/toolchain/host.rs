//! The slice of the host environment the locator probes look at.

use std::ffi::OsString;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// A single discovery step failed. Always recovered by the locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    Spawn {
        program: PathBuf,
        reason: String,
    },
    TimedOut {
        program: PathBuf,
        timeout: Duration,
    },
    ToolFailed {
        command: String,
        status: String,
        output: String,
    },
    UnparseableVersion {
        program: PathBuf,
        output: String,
    },
    /// The tool ran fine but its install layout gives no library directory.
    Layout {
        program: PathBuf,
        reason: String,
    },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProbeError::Spawn { program, reason } => {
                write!(f, "could not run {}: {reason}", program.display())
            }
            ProbeError::TimedOut { program, timeout } => write!(
                f,
                "{} timed out after {}ms",
                program.display(),
                timeout.as_millis()
            ),
            ProbeError::ToolFailed {
                command,
                status,
                output,
            } => write!(
                f,
                "command failed with status {status}: {command}\noutput was:\n{output}"
            ),
            ProbeError::UnparseableVersion { program, output } => write!(
                f,
                "{} reported an unrecognised version: {:?}",
                program.display(),
                output
            ),
            ProbeError::Layout { program, reason } => write!(
                f,
                "unexpected install layout around {}: {reason}",
                program.display()
            ),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Environment lookups, PATH search and tool invocation used by the probes.
pub trait Host {
    /// Raw value of an environment variable. Not required to be UTF-8.
    fn env_var(&self, key: &str) -> Option<OsString>;

    /// Full path of `name` if it is on the executable search path.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Run `program args..` to completion and return its stdout.
    /// A non-zero exit status is an error.
    fn run(&self, program: &Path, args: &[&str]) -> Result<String, ProbeError>;

    fn is_windows(&self) -> bool;
}

/// The real process environment.
#[derive(Debug, Clone)]
pub struct SystemHost {
    timeout: Duration,
}

impl Default for SystemHost {
    fn default() -> Self {
        SystemHost {
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl SystemHost {
    pub fn with_timeout(timeout: Duration) -> Self {
        SystemHost { timeout }
    }
}

impl Host for SystemHost {
    fn env_var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn run(&self, program: &Path, args: &[&str]) -> Result<String, ProbeError> {
        let command_line = format!("{} {}", program.display(), args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProbeError::Spawn {
                program: program.to_path_buf(),
                reason: e.to_string(),
            })?;

        // Drain both pipes while waiting so a chatty tool can't fill them and stall.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let start = Instant::now();
        let status = loop {
            let exited = child.try_wait().map_err(|e| ProbeError::Spawn {
                program: program.to_path_buf(),
                reason: e.to_string(),
            })?;
            if let Some(status) = exited {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are left detached: a grandchild may still hold the pipes.
                return Err(ProbeError::TimedOut {
                    program: program.to_path_buf(),
                    timeout: self.timeout,
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        };
        let stdout_bytes = stdout_reader.join().unwrap_or_default();
        let stderr_bytes = stderr_reader.join().unwrap_or_default();

        let stdout = String::from_utf8_lossy(&stdout_bytes).trim().to_string();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            let mut combined = stdout;
            if !stderr.trim().is_empty() {
                if !combined.is_empty() {
                    combined.push('\n');
                }
                combined.push_str(stderr.trim());
            }
            return Err(ProbeError::ToolFailed {
                command: command_line,
                status: status.to_string(),
                output: combined,
            });
        }
        log::debug!("`{command_line}` returned: {stdout}");
        Ok(stdout)
    }

    fn is_windows(&self) -> bool {
        cfg!(target_os = "windows")
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_successful_tool() {
        let host = SystemHost::default();
        let output = host
            .run(Path::new("sh"), &["-c", "echo 17.0.6"])
            .expect("sh should run");
        assert_eq!(output, "17.0.6");
    }

    #[test]
    fn non_zero_exit_is_a_tool_failure() {
        let host = SystemHost::default();
        let err = host
            .run(Path::new("sh"), &["-c", "echo broken >&2; exit 3"])
            .expect_err("exit 3 must fail");

        match err {
            ProbeError::ToolFailed { output, .. } => assert_eq!(output, "broken"),
            other => panic!("expected tool failure, got {other:?}"),
        }
    }

    #[test]
    fn hung_tool_is_killed_after_timeout() {
        let host = SystemHost::with_timeout(Duration::from_millis(100));
        let err = host
            .run(Path::new("sh"), &["-c", "sleep 5"])
            .expect_err("sleep must time out");
        assert!(matches!(err, ProbeError::TimedOut { .. }));
    }

    #[test]
    fn large_output_does_not_stall_the_tool() {
        let host = SystemHost::with_timeout(Duration::from_secs(5));
        let output = host
            .run(
                Path::new("sh"),
                &["-c", "head -c 300000 /dev/zero | tr '\\0' x; echo; echo done >&2"],
            )
            .expect("tool writing past the pipe buffer should finish");
        assert_eq!(output.len(), 300_000);
    }

    #[test]
    fn non_utf8_variables_are_returned_verbatim() {
        use std::os::unix::ffi::OsStrExt;

        let key = "CXXAST_TEST_NON_UTF8_VALUE";
        let value = std::ffi::OsStr::from_bytes(b"/opt/ll\xE9vm/lib");
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(key, value) };
        let read = SystemHost::default().env_var(key);
        unsafe { std::env::remove_var(key) };

        assert_eq!(read.as_deref(), Some(value));
    }

    #[test]
    fn layout_error_names_the_tool() {
        let err = ProbeError::Layout {
            program: PathBuf::from("clang++"),
            reason: String::from("driver path has no parent directory"),
        };
        assert_eq!(
            err.to_string(),
            "unexpected install layout around clang++: driver path has no parent directory"
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let host = SystemHost::default();
        let err = host
            .run(Path::new("/nonexistent/llvm-config"), &["--version"])
            .expect_err("missing binary must fail");
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
