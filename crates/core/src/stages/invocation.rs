//! Typed tool invocations and the process-spawn abstraction.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::error::ProcessError;

/// Captured stderr is cut to this many trailing bytes.
const MAX_CAPTURED_OUTPUT: usize = 8 * 1024;

/// A program, its argument vector and an optional working directory.
///
/// Arguments are never joined into a shell string; untrusted values
/// (source references, file names) travel as discrete arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Whether any argument equals `value`.
    pub fn has_arg(&self, value: impl AsRef<OsStr>) -> bool {
        self.args.iter().any(|a| a.as_os_str() == value.as_ref())
    }

    /// The argument following `flag`, if present.
    pub fn arg_after(&self, flag: impl AsRef<OsStr>) -> Option<&OsStr> {
        let flag = flag.as_ref();
        self.args
            .iter()
            .position(|a| a.as_os_str() == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(|a| a.as_os_str())
    }

    /// Human-readable rendering for logs only.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ToolOutput {
    /// A successful exit with no output.
    pub fn ok() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            ..Default::default()
        }
    }

    /// A failed exit with the given code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            success: false,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Stderr if non-empty.
    pub fn stderr_opt(&self) -> Option<String> {
        let trimmed = self.stderr.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Spawns tool invocations and waits for them.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the invocation to completion or until `limit` elapses.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::success`]. Dropping the returned future terminates the
    /// child process.
    async fn run(
        &self,
        invocation: &ToolInvocation,
        limit: Duration,
    ) -> Result<ToolOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(MAX_CAPTURED_OUTPUT);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        limit: Duration,
    ) -> Result<ToolOutput, ProcessError> {
        let start = Instant::now();
        debug!("Spawning: {}", invocation.display());

        let mut command = Command::new(invocation.program());
        command
            .args(invocation.arg_list())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = invocation.working_dir() {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: invocation.program().to_path_buf(),
                }
            } else {
                ProcessError::Io(e)
            }
        })?;

        // On timeout the wait future is dropped with the child inside it,
        // and kill_on_drop terminates the process.
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProcessError::Timeout {
                    program: invocation.program().to_path_buf(),
                    timeout_secs: limit.as_secs(),
                })
            }
        };

        Ok(ToolOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: tail(&output.stdout),
            stderr: tail(&output.stderr),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
