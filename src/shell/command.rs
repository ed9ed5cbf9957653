//! External command execution.

use crate::error::{ProvisionError, Result};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// A program and its arguments, run without an intermediate shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command from a program and arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run this command through `sudo`.
    pub fn with_sudo(self) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Quote an argument for display in a POSIX shell.
fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@')
        });
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }

    /// Combined stdout and stderr, for pattern matching on failures.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with process env).
    pub env: HashMap<String, String>,

    /// Capture stdout (if false, inherits from parent).
    pub capture_stdout: bool,

    /// Capture stderr (if false, inherits from parent).
    pub capture_stderr: bool,
}

/// Output line from command execution.
#[derive(Debug, Clone)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Callback for streaming output.
pub type OutputCallback = Box<dyn Fn(OutputLine) + Send>;

fn build(spec: &CommandSpec, options: &CommandOptions) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd
}

fn spawn_error(spec: &CommandSpec, err: std::io::Error) -> ProvisionError {
    tracing::debug!("failed to start `{}`: {}", spec, err);
    ProvisionError::CommandFailed {
        command: spec.to_string(),
        code: None,
    }
}

/// Execute a command.
pub fn execute(spec: &CommandSpec, options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();
    tracing::debug!("running `{}`", spec);

    let mut cmd = build(spec, options);

    if options.capture_stdout {
        cmd.stdout(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
    }

    if options.capture_stderr {
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    let output = cmd.output().map_err(|e| spawn_error(spec, e))?;

    let duration = start.elapsed();

    let stdout = if options.capture_stdout {
        String::from_utf8_lossy(&output.stdout).to_string()
    } else {
        String::new()
    };

    let stderr = if options.capture_stderr {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::new()
    };

    if output.status.success() {
        Ok(CommandResult::success(stdout, stderr, duration))
    } else {
        Ok(CommandResult::failure(
            output.status.code(),
            stdout,
            stderr,
            duration,
        ))
    }
}

/// Execute a command and collect output without streaming.
pub fn execute_quiet(spec: &CommandSpec) -> Result<CommandResult> {
    let options = CommandOptions {
        capture_stdout: true,
        capture_stderr: true,
        ..Default::default()
    };
    execute(spec, &options)
}

/// Execute a command, passing each output line to `callback` while also
/// capturing it.
pub fn execute_streaming(
    spec: &CommandSpec,
    options: &CommandOptions,
    callback: OutputCallback,
) -> Result<CommandResult> {
    let start = Instant::now();
    tracing::debug!("running `{}` (streaming)", spec);

    let mut cmd = build(spec, options);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ProvisionError::CommandFailed {
            command: spec.to_string(),
            code: None,
        });
    };

    let (tx, rx) = mpsc::channel();
    let tx_stdout = tx.clone();
    let tx_stderr = tx;

    let stdout_handle = thread::spawn(move || {
        drain_lines(stdout, |line| {
            let _ = tx_stdout.send(OutputLine::Stdout(line));
        })
    });
    let stderr_handle = thread::spawn(move || {
        drain_lines(stderr, |line| {
            let _ = tx_stderr.send(OutputLine::Stderr(line));
        })
    });

    for line in rx {
        callback(line);
    }

    let stdout_output = stdout_handle.join().unwrap_or_default();
    let stderr_output = stderr_handle.join().unwrap_or_default();

    let status = child.wait().map_err(|e| spawn_error(spec, e))?;

    let duration = start.elapsed();

    if status.success() {
        Ok(CommandResult::success(
            stdout_output,
            stderr_output,
            duration,
        ))
    } else {
        Ok(CommandResult::failure(
            status.code(),
            stdout_output,
            stderr_output,
            duration,
        ))
    }
}

/// Read `reader` to EOF line by line, handing each line to `emit`.
///
/// Bytes that are not UTF-8 are replaced rather than ending the read, so
/// the child never sees a closed pipe. Returns everything read.
fn drain_lines(reader: impl Read, mut emit: impl FnMut(String)) -> String {
    let mut reader = BufReader::new(reader);
    let mut output = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                output.push_str(&line);
                output.push('\n');
                emit(line);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("stopped reading command output: {}", e);
                break;
            }
        }
    }
    output
}

/// Callback that echoes output lines to the parent's stdout/stderr.
pub fn echo_output() -> OutputCallback {
    Box::new(|line| match line {
        OutputLine::Stdout(l) => println!("{}", l),
        OutputLine::Stderr(l) => eprintln!("{}", l),
    })
}

/// Callback that discards output lines.
pub fn discard_output() -> OutputCallback {
    Box::new(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script])
    }

    #[test]
    fn execute_successful_command() {
        let options = CommandOptions {
            capture_stdout: true,
            capture_stderr: true,
            ..Default::default()
        };

        let result = execute(&CommandSpec::new("echo", ["hello"]), &options).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn execute_failing_command_reports_code() {
        let result = execute_quiet(&sh("exit 3")).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn execute_missing_program_is_command_failed() {
        let err = execute_quiet(&CommandSpec::new("definitely-not-a-program-xyz", ["x"]))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::CommandFailed { .. }));
    }

    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions {
            capture_stdout: true,
            capture_stderr: true,
            ..Default::default()
        };
        options
            .env
            .insert("MY_VAR".to_string(), "my_value".to_string());

        let result = execute(&sh("echo $MY_VAR"), &options).unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            capture_stdout: true,
            ..Default::default()
        };

        let result = execute(&CommandSpec::new("pwd", Vec::<String>::new()), &options).unwrap();

        assert!(result.success);
    }

    #[test]
    fn execute_streaming_captures_both_streams() {
        use std::sync::{Arc, Mutex};

        let lines = Arc::new(Mutex::new(Vec::new()));
        let lines_clone = Arc::clone(&lines);

        let callback: OutputCallback = Box::new(move |line| {
            lines_clone.lock().unwrap().push(line);
        });

        let result = execute_streaming(
            &sh("echo line1; echo oops >&2; exit 4"),
            &CommandOptions::default(),
            callback,
        )
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(4));
        assert!(result.stdout.contains("line1"));
        assert!(result.stderr.contains("oops"));

        let captured = lines.lock().unwrap();
        assert!(captured.iter().any(|l| matches!(l, OutputLine::Stdout(_))));
        assert!(captured.iter().any(|l| matches!(l, OutputLine::Stderr(_))));
    }

    #[test]
    fn execute_streaming_keeps_reading_past_invalid_utf8() {
        let script = "printf 'caf\\351\\n'; \
                      i=0; while [ $i -lt 3000 ]; do \
                      echo 'Reading package lists... Building dependency tree... Reading state information...'; \
                      i=$((i+1)); done; \
                      echo 'E: Unable to locate package foo'; exit 100";

        let result = execute_streaming(&sh(script), &CommandOptions::default(), discard_output())
            .unwrap();

        assert_eq!(result.exit_code, Some(100));
        assert!(result.stdout.starts_with("caf\u{FFFD}\n"));
        assert!(result.stdout.contains("E: Unable to locate package foo"));
    }

    #[test]
    fn drain_lines_handles_crlf_and_missing_final_newline() {
        let mut seen = Vec::new();
        let output = drain_lines(&b"one\r\ntwo"[..], |line| seen.push(line));
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(output, "one\ntwo\n");
    }

    #[test]
    fn combined_output_joins_streams() {
        let result = CommandResult::failure(
            Some(1),
            "out".to_string(),
            "err".to_string(),
            Duration::ZERO,
        );
        assert_eq!(result.combined_output(), "out\nerr");
    }

    #[test]
    fn with_sudo_prefixes_program() {
        let spec = CommandSpec::new("apt-get", ["install", "-y"]).with_sudo();
        assert_eq!(spec.program, "sudo");
        assert_eq!(spec.args, vec!["apt-get", "install", "-y"]);
    }

    #[test]
    fn display_quotes_unsafe_arguments() {
        let spec = CommandSpec::new("dpkg-query", ["-W", "-f=${Status}", "it's"]);
        assert_eq!(spec.to_string(), r"dpkg-query -W '-f=${Status}' 'it'\''s'");
    }

    #[test]
    fn builder_appends_args() {
        let spec = CommandSpec::new("python3", ["-m", "pip"])
            .arg("install")
            .args(["-r", "requirements.txt"]);
        assert_eq!(spec.to_string(), "python3 -m pip install -r requirements.txt");
    }
}
