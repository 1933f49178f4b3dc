//! Blocking subprocess execution for the external media tools.
//!
//! Every one-shot `ffmpeg`/`ffprobe` call goes through a [`ToolRunner`], so
//! the probes, the normalizer and the concatenator can be driven by a
//! scripted runner in tests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use reelforge_common::config::ToolPaths;
use reelforge_common::error::{ReelError, ReelResult};

/// External program an [`Invocation`] targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    /// Any other program, looked up on `PATH`.
    Program(String),
}

impl Tool {
    pub fn name(&self) -> &str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Program(name) => name,
        }
    }
}

/// One subprocess call: program, arguments, and an optional wait limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<I, S>(tool: Tool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    pub fn ffmpeg<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Tool::Ffmpeg, args)
    }

    pub fn ffprobe<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Tool::Ffprobe, args)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The last argument, which is the output path for every ffmpeg call
    /// this crate builds.
    pub fn output_path(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    /// Human-readable exit status (e.g. `exit status: 1`).
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn a non-zero exit into [`ReelError::Subprocess`].
    pub fn into_result(self, tool: &Tool) -> ReelResult<ToolOutput> {
        if self.success {
            Ok(self)
        } else {
            Err(ReelError::subprocess(
                tool.name(),
                self.status,
                self.stderr.trim().to_string(),
            ))
        }
    }
}

/// Runs one subprocess to completion.
///
/// `Err` means the process could not be started or did not finish in time;
/// a non-zero exit is reported through [`ToolOutput::success`].
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> ReelResult<ToolOutput>;

    /// Run and require a zero exit status.
    fn run_checked(&self, invocation: &Invocation) -> ReelResult<ToolOutput> {
        let output = self.run(invocation)?;
        if !output.success {
            tracing::warn!(
                tool = invocation.tool.name(),
                status = %output.status,
                stderr = %output.stderr.trim(),
                "Subprocess failed"
            );
        }
        output.into_result(&invocation.tool)
    }
}

/// [`ToolRunner`] backed by real processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    tools: ToolPaths,
}

impl ProcessRunner {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Executable used for `tool`.
    pub fn program(&self, tool: &Tool) -> PathBuf {
        match tool {
            Tool::Ffmpeg => self.tools.ffmpeg.clone(),
            Tool::Ffprobe => self.tools.ffprobe.clone(),
            Tool::Program(name) => PathBuf::from(name),
        }
    }
}

impl ToolRunner for ProcessRunner {
    /// Runs the process on a private current-thread runtime, so callers
    /// inside an async context must go through `spawn_blocking`.
    fn run(&self, invocation: &Invocation) -> ReelResult<ToolOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async(invocation))
    }
}

impl ProcessRunner {
    async fn run_async(&self, invocation: &Invocation) -> ReelResult<ToolOutput> {
        let program = self.program(&invocation.tool);
        tracing::debug!(
            program = %program.display(),
            args = ?invocation.args,
            "Running subprocess"
        );

        let child = Command::new(&program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ReelError::ToolMissing {
                    tool: program.display().to_string(),
                },
                _ => ReelError::subprocess(
                    invocation.tool.name(),
                    "failed to start",
                    e.to_string(),
                ),
            })?;

        let started = Instant::now();
        // Dropping the timed-out future drops the child, which kills it.
        let output = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    tracing::warn!(
                        tool = invocation.tool.name(),
                        timeout_secs = limit.as_secs_f64(),
                        "Subprocess timed out, killing it"
                    );
                    return Err(ReelError::subprocess(
                        invocation.tool.name(),
                        format!("timed out after {:.1}s", limit.as_secs_f64()),
                        "",
                    ));
                }
            },
            None => child.wait_with_output().await?,
        };

        tracing::debug!(
            tool = invocation.tool.name(),
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Subprocess finished"
        );

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Whether `binary` resolves to an executable, either as a path or on `PATH`.
pub fn command_exists(binary: &Path) -> bool {
    which::which(binary).is_ok()
}
