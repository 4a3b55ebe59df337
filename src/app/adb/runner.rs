use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::error::ProvisionError;
use crate::app::models::DeviceCommandResult;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }

    pub fn into_result(self) -> DeviceCommandResult {
        DeviceCommandResult {
            combined_output: self.combined(),
            succeeded: self.exit_code == Some(0),
            exit_code: self.exit_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Synchronous process boundary used by every device and host command.
pub trait CommandChannel {
    /// Runs one process to completion. Errors only when it cannot run at all.
    fn execute(&self, invocation: &Invocation) -> Result<DeviceCommandResult, ProvisionError>;

    /// Starts a process without waiting for it.
    fn launch_detached(&self, invocation: &Invocation) -> Result<(), ProvisionError>;

    /// Like `execute`, but a non-zero exit is an error carrying the output.
    fn run(&self, invocation: &Invocation) -> Result<String, ProvisionError> {
        let result = self.execute(invocation)?;
        if result.succeeded {
            Ok(result.combined_output)
        } else {
            Err(ProvisionError::command(
                &invocation.program,
                &invocation.args,
                result.combined_output.trim(),
                result.exit_code,
            ))
        }
    }
}

pub struct SystemChannel {
    timeout: Duration,
    trace_id: String,
}

impl SystemChannel {
    pub fn new(timeout: Duration, trace_id: impl Into<String>) -> Self {
        Self {
            timeout,
            trace_id: trace_id.into(),
        }
    }
}

impl CommandChannel for SystemChannel {
    fn execute(&self, invocation: &Invocation) -> Result<DeviceCommandResult, ProvisionError> {
        debug!(trace_id = %self.trace_id, command = %invocation.command_line(), "execute");
        let output = run_invocation_with_timeout(invocation, self.timeout)?;
        debug!(
            trace_id = %self.trace_id,
            command = %invocation.command_line(),
            exit_code = ?output.exit_code,
            "finished"
        );
        Ok(output.into_result())
    }

    fn launch_detached(&self, invocation: &Invocation) -> Result<(), ProvisionError> {
        debug!(trace_id = %self.trace_id, command = %invocation.command_line(), "launch detached");
        launch_detached(invocation)
    }
}

fn spawn_error(program: &str, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::Spawn {
        program: program.to_string(),
        message: err.to_string(),
    }
}

fn drain<R: Read + Send + 'static>(reader: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut reader = reader;
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

pub fn run_invocation_with_timeout(
    invocation: &Invocation,
    timeout: Duration,
) -> Result<CommandOutput, ProvisionError> {
    let program = invocation.program.as_str();
    let mut command = Command::new(program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = invocation.cwd.as_ref() {
        command.current_dir(dir);
    }
    let mut child = command.spawn().map_err(|err| spawn_error(program, err))?;

    if let Some(input) = invocation.stdin.as_ref() {
        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits before reading is not an error here; its exit code tells.
            let _ = stdin.write_all(input.as_bytes());
        }
    }

    // Drain stdout/stderr in parallel; otherwise, a chatty child process can block once the pipe
    // buffer fills, and we will incorrectly hit the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error(program, "failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_error(program, "failed to capture stderr"))?;
    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(spawn_error(
                        program,
                        format!("timed out after {} seconds", timeout.as_secs()),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(spawn_error(program, format!("failed to poll command: {err}")));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

pub fn launch_detached(invocation: &Invocation) -> Result<(), ProvisionError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(dir) = invocation.cwd.as_ref() {
        command.current_dir(dir);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
    command
        .spawn()
        .map(drop)
        .map_err(|err| spawn_error(&invocation.program, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Invocation {
        if cfg!(windows) {
            Invocation::new("cmd.exe").args(["/C", script])
        } else {
            Invocation::new("sh").args(["-c", script])
        }
    }

    #[test]
    fn large_stdout_does_not_deadlock() {
        // Regression test: If stdout/stderr are piped but not drained, the child can block once
        // the pipe buffer fills, causing an otherwise-fast command to "hang" until we hit the
        // timeout.
        let invocation = if cfg!(windows) {
            shell("for /L %i in (1,1,100000) do @echo 1234567890")
        } else {
            shell("i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done")
        };
        let min_stdout_len = 1_000_000usize;

        let output = run_invocation_with_timeout(&invocation, Duration::from_secs(10))
            .expect("expected large-output command to complete without timing out");

        assert_eq!(output.exit_code, Some(0));
        assert!(
            output.stdout.len() >= min_stdout_len,
            "expected stdout >= {min_stdout_len}, got {}",
            output.stdout.len()
        );
    }

    #[cfg(unix)]
    #[test]
    fn combines_stdout_and_stderr() {
        let channel = SystemChannel::new(Duration::from_secs(10), "trace-combined");
        let result = channel
            .execute(&shell("echo out; echo err 1>&2"))
            .expect("execute");
        assert!(result.succeeded);
        assert!(result.combined_output.contains("out"));
        assert!(result.combined_output.contains("err"));
    }

    #[cfg(unix)]
    #[test]
    fn run_surfaces_non_zero_exit_with_output() {
        let channel = SystemChannel::new(Duration::from_secs(10), "trace-fail");
        let err = channel
            .run(&shell("echo diagnostic 1>&2; exit 3"))
            .expect_err("non-zero exit");
        match err {
            ProvisionError::Command {
                output, exit_code, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(output, "diagnostic");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn feeds_stdin_and_honors_cwd() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let channel = SystemChannel::new(Duration::from_secs(10), "trace-stdin");
        let output = channel
            .run(&shell("read answer; echo \"$answer\"; pwd").stdin("y\n").cwd(dir.path()))
            .expect("run");
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("y"));
        let reported = lines.next().expect("pwd line");
        let expected = dir.path().canonicalize().expect("canonical");
        assert_eq!(
            std::path::Path::new(reported).canonicalize().expect("canonical pwd"),
            expected
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let missing = Invocation::new("definitely-not-a-real-binary-xyz");
        let err = run_invocation_with_timeout(&missing, Duration::from_secs(1))
            .expect_err("spawn should fail");
        assert!(matches!(err, ProvisionError::Spawn { .. }));
    }
}
