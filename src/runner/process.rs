use crate::error::{FailureDetail, HashBakerError, Result};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How much of a tool's output the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Discard stdout; stderr is only kept to explain a failure.
    Quiet,
    /// Return stdout and stderr in full.
    Capture,
}

/// Declarative description of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
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
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub trait CommandRunner {
    fn run(&self, command: &ToolCommand, mode: OutputMode, timeout: Duration) -> Result<ToolOutput>;
}

pub struct ProcessRunner {
    poll_interval: Duration,
    tail_lines: usize,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(25),
            tail_lines: 3,
        }
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        command: &ToolCommand,
        timeout: Duration,
    ) -> Result<Option<ExitStatus>> {
        let started = Instant::now();

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(e) => return Err(launch_failure(command, &e)),
            }

            if started.elapsed() >= timeout {
                return Ok(None);
            }

            thread::sleep(self.poll_interval);
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand, mode: OutputMode, timeout: Duration) -> Result<ToolOutput> {
        debug!(
            tool = %command.tool,
            program = %command.program.display(),
            ?mode,
            "launching external tool"
        );

        let stdout = match mode {
            OutputMode::Quiet => Stdio::null(),
            OutputMode::Capture => Stdio::piped(),
        };

        let mut builder = Command::new(&command.program);
        builder
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped());

        // Own process group, so a timeout reaches everything the tool started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            builder.process_group(0);
        }

        let mut child = builder.spawn().map_err(|e| launch_failure(command, &e))?;

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = match self.wait_with_deadline(&mut child, command, timeout)? {
            Some(status) => status,
            None => {
                // Readers are left detached; a process that left the group may still hold the pipes.
                terminate(&mut child);
                warn!(tool = %command.tool, timeout_secs = timeout.as_secs(), "tool timed out");
                return Err(HashBakerError::ToolInvocationFailed {
                    tool: command.tool.clone(),
                    exit_code: None,
                    detail: FailureDetail::Timeout(timeout),
                });
            }
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        // Killed by a signal: no exit code, treat as generic failure.
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            tool = %command.tool,
            exit_code,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "tool finished"
        );

        if exit_code != 0 {
            return Err(HashBakerError::ToolInvocationFailed {
                tool: command.tool.clone(),
                exit_code: Some(exit_code),
                detail: FailureDetail::Stderr(stderr_tail(&stderr, self.tail_lines)),
            });
        }

        Ok(match mode {
            OutputMode::Quiet => ToolOutput {
                exit_code,
                ..ToolOutput::default()
            },
            OutputMode::Capture => ToolOutput {
                exit_code,
                stdout,
                stderr,
            },
        })
    }
}

fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(group) = libc::pid_t::try_from(child.id()) {
            // SAFETY: killpg only sends a signal; the group is led by our own unreaped child.
            unsafe {
                libc::killpg(group, libc::SIGKILL);
            }
        }
    }

    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn launch_failure(command: &ToolCommand, error: &std::io::Error) -> HashBakerError {
    HashBakerError::ToolInvocationFailed {
        tool: command.tool.clone(),
        exit_code: None,
        detail: FailureDetail::Launch(error.to_string()),
    }
}

/// Last `lines` non-blank lines of stderr, joined with spaces.
pub fn stderr_tail(stderr: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let start = kept.len().saturating_sub(lines);
    kept[start..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = ToolCommand::new("zip2john", "/usr/sbin/zip2john")
            .arg("secret.zip")
            .args(["-a", "-b"]);
        assert_eq!(cmd.tool, "zip2john");
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.args[0], "secret.zip");
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = b"line one\n\nline two\nline three\nline four\n";
        assert_eq!(stderr_tail(stderr, 2), "line three line four");
        assert_eq!(stderr_tail(b"", 3), "");
        assert_eq!(stderr_tail(b"only\n", 3), "only");
    }

    #[test]
    fn test_missing_program_is_launch_failure() {
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("ghost", "/nonexistent/bin/ghost-extractor-12345");
        let err = runner
            .run(&cmd, OutputMode::Capture, Duration::from_secs(5))
            .unwrap_err();

        match err {
            HashBakerError::ToolInvocationFailed {
                exit_code: None,
                detail: FailureDetail::Launch(_),
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_mode_returns_output() {
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("sh", "sh").args(["-c", "printf 'hash-line'; printf 'note' >&2"]);
        let output = runner
            .run(&cmd, OutputMode::Capture, Duration::from_secs(10))
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, b"hash-line");
        assert_eq!(output.stderr, b"note");
    }

    #[cfg(unix)]
    #[test]
    fn test_quiet_mode_discards_output() {
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("sh", "sh").args(["-c", "echo hidden; echo noise >&2"]);
        let output = runner
            .run(&cmd, OutputMode::Quiet, Duration::from_secs(10))
            .unwrap();

        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_surfaces_stderr_tail() {
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("sh", "sh")
            .args(["-c", "echo first >&2; echo 'not encrypted' >&2; exit 3"]);
        let err = runner
            .run(&cmd, OutputMode::Quiet, Duration::from_secs(10))
            .unwrap_err();

        match err {
            HashBakerError::ToolInvocationFailed {
                tool,
                exit_code: Some(3),
                detail: FailureDetail::Stderr(tail),
            } => {
                assert_eq!(tool, "sh");
                assert!(tail.ends_with("not encrypted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_tool() {
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("sleep", "sleep").arg("5");
        let started = Instant::now();
        let err = runner
            .run(&cmd, OutputMode::Capture, Duration::from_millis(200))
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            HashBakerError::ToolInvocationFailed {
                exit_code: None,
                detail: FailureDetail::Timeout(limit),
                ..
            } => assert_eq!(limit, Duration::from_millis(200)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timeout_kills_processes_started_by_tool() {
        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        let runner = ProcessRunner::new();
        let cmd = ToolCommand::new("sh", "sh").args(["-c", script.as_str()]);

        let err = runner
            .run(&cmd, OutputMode::Quiet, Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(
            err,
            HashBakerError::ToolInvocationFailed {
                detail: FailureDetail::Timeout(_),
                ..
            }
        ));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let stat = PathBuf::from("/proc").join(&pid).join("stat");
        let deadline = Instant::now() + Duration::from_secs(5);
        let gone = loop {
            // Gone, or a zombie waiting for init to reap it.
            let alive = std::fs::read_to_string(&stat)
                .map(|s| {
                    s.rsplit_once(')')
                        .map(|(_, rest)| !rest.trim_start().starts_with(['Z', 'X']))
                        .unwrap_or(false)
                })
                .unwrap_or(false);
            if !alive {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            thread::sleep(Duration::from_millis(50));
        };
        assert!(gone, "sleep {} outlived the timeout", pid);
    }
}
