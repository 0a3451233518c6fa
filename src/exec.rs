//! External process execution with dry-run, elevation, timeout and
//! line streaming.
//!
//! Every backend and the module scheduler go through the [`Executor`] trait.
//! A non-zero exit, a launch failure or a timeout is never an `Err`: it is
//! encoded in the returned [`CommandResult`] and the caller decides whether
//! to escalate it.
use std::io::{BufRead as _, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::logging::Log;

/// Safety-net ceiling applied when the caller does not pick a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60 * 60);

/// Helper prepended to elevated commands unless configured otherwise.
pub const DEFAULT_ELEVATION_HELPER: &str = "sudo";

/// How often the wait loop re-checks the child while no output arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to keep draining pipes after the child exited. A process the
/// script left running in the background may hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Per-invocation options.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Kill the process and report `timed_out` once this elapses.
    pub timeout: Duration,
    /// Run through the elevation helper.
    pub elevate: bool,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            elevate: false,
            env: Vec::new(),
        }
    }
}

impl ExecOptions {
    /// Run the command through the elevation helper.
    #[must_use]
    pub const fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    /// Override the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Inject environment variables.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

/// Outcome of one process invocation.
#[derive(Debug)]
pub struct CommandResult {
    /// Rendered invocation, after elevation rewriting.
    pub command: String,
    /// Process exit code; `-1` when the process never ran, was killed by a
    /// signal, or timed out.
    pub exit_code: i32,
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
    /// `true` iff `exit_code == 0`, or the invocation was a dry run.
    pub success: bool,
    /// The timeout fired and the process was killed.
    pub timed_out: bool,
    /// Why the process could not be launched or awaited.
    pub failure_detail: Option<std::io::Error>,
}

impl CommandResult {
    fn dry_run(command: String, echo: String) -> Self {
        Self {
            command,
            exit_code: 0,
            stdout: echo,
            stderr: String::new(),
            success: true,
            timed_out: false,
            failure_detail: None,
        }
    }

    fn exited(command: String, status: ExitStatus, output: Captured) -> Self {
        let exit_code = status.code().unwrap_or(-1);
        Self {
            command,
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            success: exit_code == 0,
            timed_out: false,
            failure_detail: None,
        }
    }

    fn timed_out(command: String, timeout: Duration, output: Captured) -> Self {
        let mut stderr = output.stderr;
        stderr.push_str(&format!("Command timed out after {timeout:?}\n"));
        Self {
            command,
            exit_code: -1,
            stdout: output.stdout,
            stderr,
            success: false,
            timed_out: true,
            failure_detail: None,
        }
    }

    fn failed(command: String, error: std::io::Error, output: Captured) -> Self {
        let mut stderr = output.stderr;
        stderr.push_str(&format!("{error}\n"));
        Self {
            command,
            exit_code: -1,
            stdout: output.stdout,
            stderr,
            success: false,
            timed_out: false,
            failure_detail: Some(error),
        }
    }

    /// One-line description of why the command did not succeed.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            "timed out".to_string()
        } else if let Some(err) = &self.failure_detail {
            format!("could not run: {err}")
        } else {
            format!("exit {}", self.exit_code)
        }
    }
}

/// Receives output lines as the process produces them.
///
/// Lines of one stream arrive in source order; the two streams may
/// interleave arbitrarily.
pub trait OutputSink {
    /// A line written to stdout, without its terminator.
    fn stdout_line(&mut self, line: &str);
    /// A line written to stderr, without its terminator.
    fn stderr_line(&mut self, line: &str);
}

/// Sink that ignores all output; results are still fully buffered.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl OutputSink for Discard {
    fn stdout_line(&mut self, _: &str) {}
    fn stderr_line(&mut self, _: &str) {}
}

/// Sink that forwards every line to a [`Log`] as progress output.
#[derive(Clone, Copy)]
pub struct LogSink<'a> {
    log: &'a dyn Log,
}

impl std::fmt::Debug for LogSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").field("log", &"<dyn Log>").finish()
    }
}

impl<'a> LogSink<'a> {
    /// Forward output to `log`.
    #[must_use]
    pub const fn new(log: &'a dyn Log) -> Self {
        Self { log }
    }
}

impl OutputSink for LogSink<'_> {
    fn stdout_line(&mut self, line: &str) {
        self.log.output(line);
    }

    fn stderr_line(&mut self, line: &str) {
        self.log.output(line);
    }
}

/// Runs external programs.
///
/// The seam between provisioning logic and the host; tests substitute a
/// recording implementation.
pub trait Executor: Send + Sync {
    /// Run `program` with `args`, streaming lines to `sink` and buffering
    /// them into the result. Never fails: see [`CommandResult`].
    fn execute(
        &self,
        program: &str,
        args: &[&str],
        opts: &ExecOptions,
        sink: &mut dyn OutputSink,
    ) -> CommandResult;

    /// Run without streaming consumers.
    fn run(&self, program: &str, args: &[&str], opts: &ExecOptions) -> CommandResult {
        self.execute(program, args, opts, &mut Discard)
    }

    /// Whether invocations are simulated.
    fn is_dry_run(&self) -> bool;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// The real [`Executor`], spawning processes on the host.
pub struct ProcessRunner {
    dry_run: bool,
    elevate_with: String,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("dry_run", &self.dry_run)
            .field("elevate_with", &self.elevate_with)
            .field("log", &"<dyn Log>")
            .finish()
    }
}

impl ProcessRunner {
    /// Create a runner. `dry_run` is fixed for the runner's lifetime.
    #[must_use]
    pub fn new(dry_run: bool, log: Arc<dyn Log>) -> Self {
        Self {
            dry_run,
            elevate_with: DEFAULT_ELEVATION_HELPER.to_string(),
            log,
        }
    }

    /// Use `helper` instead of `sudo` for elevated commands.
    #[must_use]
    pub fn with_elevation_helper(mut self, helper: &str) -> Self {
        self.elevate_with = helper.to_string();
        self
    }

    /// The elevation helper in use.
    #[must_use]
    pub fn elevation_helper(&self) -> &str {
        &self.elevate_with
    }

    /// Final argv after elevation rewriting.
    fn build_argv(&self, program: &str, args: &[&str], elevate: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if elevate && program != self.elevate_with {
            argv.push(self.elevate_with.clone());
        }
        argv.push(program.to_string());
        argv.extend(args.iter().map(|a| (*a).to_string()));
        argv
    }

    fn spawn_and_wait(
        &self,
        argv: &[String],
        command: String,
        opts: &ExecOptions,
        sink: &mut dyn OutputSink,
    ) -> CommandResult {
        let Some((program, rest)) = argv.split_first() else {
            let err = std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command");
            return CommandResult::failed(command, err, Captured::default());
        };

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &opts.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.log.error(&format!("failed to launch {command}: {e}"));
                return CommandResult::failed(command, e, Captured::default());
            }
        };

        let (tx, rx) = mpsc::channel();
        if let Some(out) = child.stdout.take() {
            spawn_reader(out, StreamLine::Stdout, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            spawn_reader(err, StreamLine::Stderr, tx.clone());
        }
        drop(tx);

        // `None` when the timeout is too large to represent: no deadline.
        let deadline = Instant::now().checked_add(opts.timeout);
        let mut captured = Captured::default();
        let mut streams_open = true;
        let mut exit: Option<(ExitStatus, Instant)> = None;

        loop {
            if exit.is_none() {
                match child.try_wait() {
                    Ok(Some(status)) => exit = Some((status, Instant::now())),
                    Ok(None) => {}
                    Err(e) => {
                        self.log.error(&format!("failed to wait for {command}: {e}"));
                        terminate(&mut child);
                        return CommandResult::failed(command, e, captured);
                    }
                }
            }

            let now = Instant::now();
            let wake = if let Some((status, exited_at)) = exit {
                // Once the child is gone only the drain window applies.
                let grace_end = exited_at + DRAIN_GRACE;
                let drain_until = deadline.map_or(grace_end, |d| d.min(grace_end));
                if !streams_open || now >= drain_until {
                    return CommandResult::exited(command, status, captured);
                }
                Some(drain_until)
            } else {
                if deadline.is_some_and(|d| now >= d) {
                    self.log.warn(&format!(
                        "command timed out after {:?}: {command}",
                        opts.timeout
                    ));
                    terminate(&mut child);
                    return CommandResult::timed_out(command, opts.timeout, captured);
                }
                deadline
            };

            let slice = wake.map_or(POLL_INTERVAL, |w| {
                w.saturating_duration_since(now).min(POLL_INTERVAL)
            });
            if streams_open {
                match rx.recv_timeout(slice) {
                    Ok(line) => captured.push(line, sink),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streams_open = false,
                }
            } else {
                thread::sleep(slice);
            }
        }
    }
}

impl Executor for ProcessRunner {
    fn execute(
        &self,
        program: &str,
        args: &[&str],
        opts: &ExecOptions,
        sink: &mut dyn OutputSink,
    ) -> CommandResult {
        let argv = self.build_argv(program, args, opts.elevate);
        let command = render_command(&argv);
        self.log.debug(&format!("executing: {command}"));

        if self.dry_run {
            self.log.dry_run(&format!("would execute: {command}"));
            let echo = format!("[DRY RUN] Would execute: {command}");
            sink.stdout_line(&echo);
            return CommandResult::dry_run(command, echo);
        }

        self.spawn_and_wait(&argv, command, opts, sink)
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Render an argv for logs, single-quoting arguments that would otherwise
/// be ambiguous.
#[must_use]
pub fn render_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'') {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A line read from one of the child's output pipes.
enum StreamLine {
    Stdout(String),
    Stderr(String),
}

/// Full output buffers accumulated while streaming.
#[derive(Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    fn push(&mut self, line: StreamLine, sink: &mut dyn OutputSink) {
        match line {
            StreamLine::Stdout(text) => {
                sink.stdout_line(&text);
                self.stdout.push_str(&text);
                self.stdout.push('\n');
            }
            StreamLine::Stderr(text) => {
                sink.stderr_line(&text);
                self.stderr.push_str(&text);
                self.stderr.push('\n');
            }
        }
    }
}

/// Drain `pipe` line by line on a background thread. Invalid UTF-8 is
/// replaced rather than ending the read, so the pipe never fills up.
fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    wrap: fn(String) -> StreamLine,
    tx: Sender<StreamLine>,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(wrap(line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn terminate(child: &mut Child) {
    child.kill().ok();
    child.wait().ok();
}
