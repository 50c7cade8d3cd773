// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local child processes with streamed, labelled output.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use lc_core::CommandLine;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::sink::{SharedSink, Stream};

/// Errors from spawning or supervising a local process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: std::io::Error },
    #[error("I/O error while running {program}: {source}")]
    Io { program: String, source: std::io::Error },
    #[error("empty command line")]
    EmptyCommand,
}

/// A program invocation: argv, working directory and extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    /// Build from a configured command line (`[program, args...]`).
    pub fn from_line(line: &CommandLine) -> Result<Self, ProcessError> {
        let (program, args) = line.split_first().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self::new(program).args(args))
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

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

/// Space-joined argv. Environment values are left out so secrets passed
/// through the environment never reach a log line.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit code plus everything a process printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs local processes.
#[async_trait]
pub trait ProcessRunner: Clone + Send + Sync + 'static {
    /// Run to completion, forwarding each output line to the sink under
    /// `label`. Returns the exit code; death by signal reads as -1.
    async fn run(&self, spec: &CommandSpec, label: &str) -> Result<i32, ProcessError>;

    /// Run to completion and collect the output instead of forwarding it.
    async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Clone)]
pub struct LocalProcessRunner {
    sink: SharedSink,
}

impl LocalProcessRunner {
    pub fn new(sink: SharedSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, spec: &CommandSpec, label: &str) -> Result<i32, ProcessError> {
        tracing::debug!(command = %spec, "spawning");
        let child = spec
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn { program: spec.program.clone(), source })?;
        forward_and_wait(child, label, &self.sink)
            .await
            .map_err(|source| ProcessError::Io { program: spec.program.clone(), source })
    }

    async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ProcessError> {
        let mut cmd = spec.command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = cmd.output().await.map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ProcessError::Spawn { program: spec.program.clone(), source }
            }
            _ => ProcessError::Io { program: spec.program.clone(), source },
        })?;
        Ok(CapturedOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Drain stdout and stderr concurrently into the sink, then reap the child.
///
/// Both pipes are read at the same time: a child blocked on a full stderr
/// pipe while we wait on stdout (or the reverse) would never exit.
async fn forward_and_wait(mut child: Child, label: &str, sink: &SharedSink) -> std::io::Result<i32> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out, err) = tokio::join!(
        forward_lines(stdout, label, Stream::Stdout, sink),
        forward_lines(stderr, label, Stream::Stderr, sink),
    );
    reap(&mut child, out.and(err)).await
}

/// Wait for `child`, or kill it first when its output could not be read.
async fn reap(child: &mut Child, forwarded: std::io::Result<()>) -> std::io::Result<i32> {
    if let Err(e) = forwarded {
        if let Err(kill) = child.kill().await {
            tracing::warn!(error = %kill, "could not kill child after output error");
        }
        return Err(e);
    }
    let status = child.wait().await?;
    Ok(status.code().unwrap_or(-1))
}

async fn forward_lines<R>(reader: Option<R>, label: &str, stream: Stream, sink: &SharedSink) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        sink.line(label, stream, text.trim_end_matches(['\n', '\r']));
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{CapturedOutput, CommandSpec, ProcessError, ProcessRunner};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted response for commands whose display contains a pattern
    #[derive(Debug, Clone)]
    enum Rule {
        Output(CapturedOutput),
        SpawnFailure,
    }

    #[derive(Default)]
    struct FakeProcessState {
        rules: Vec<(String, Rule)>,
        delays: Vec<(String, Duration)>,
        calls: Vec<(CommandSpec, Option<String>)>,
    }

    /// Fake process runner for testing.
    ///
    /// Unmatched commands exit 0 with no output. The most recently added
    /// matching rule wins.
    #[derive(Clone, Default)]
    pub struct FakeProcessRunner {
        inner: Arc<Mutex<FakeProcessState>>,
    }

    impl FakeProcessRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands containing `pattern` exit with `code`.
        pub fn exit_with(&self, pattern: &str, code: i32) {
            self.respond(pattern, CapturedOutput { code, ..CapturedOutput::default() });
        }

        /// Commands containing `pattern` exit 0 printing `stdout`.
        pub fn stdout(&self, pattern: &str, stdout: &str) {
            self.respond(pattern, CapturedOutput { code: 0, stdout: stdout.to_string(), stderr: String::new() });
        }

        pub fn respond(&self, pattern: &str, output: CapturedOutput) {
            self.inner.lock().rules.push((pattern.to_string(), Rule::Output(output)));
        }

        /// Commands containing `pattern` fail to spawn.
        pub fn spawn_fails(&self, pattern: &str) {
            self.inner.lock().rules.push((pattern.to_string(), Rule::SpawnFailure));
        }

        /// `run` of commands containing `pattern` takes `duration` to finish.
        pub fn delay(&self, pattern: &str, duration: Duration) {
            self.inner.lock().delays.push((pattern.to_string(), duration));
        }

        /// Every spec run or captured so far, in order.
        ///
        /// Recorded when a command starts.
        pub fn calls(&self) -> Vec<CommandSpec> {
            self.inner.lock().calls.iter().map(|(spec, _)| spec.clone()).collect()
        }

        /// Display strings of every command so far.
        pub fn commands(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|(spec, _)| spec.to_string()).collect()
        }

        /// Labels passed to `run` (None for `capture`).
        pub fn labels(&self) -> Vec<Option<String>> {
            self.inner.lock().calls.iter().map(|(_, label)| label.clone()).collect()
        }

        fn answer(&self, spec: &CommandSpec, label: Option<&str>) -> Result<CapturedOutput, ProcessError> {
            let mut state = self.inner.lock();
            state.calls.push((spec.clone(), label.map(str::to_string)));
            let shown = spec.to_string();
            let rule = state.rules.iter().rev().find(|(pattern, _)| shown.contains(pattern.as_str()));
            match rule {
                Some((_, Rule::Output(output))) => Ok(output.clone()),
                Some((_, Rule::SpawnFailure)) => Err(ProcessError::Spawn {
                    program: spec.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake spawn failure"),
                }),
                None => Ok(CapturedOutput::default()),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeProcessRunner {
        async fn run(&self, spec: &CommandSpec, label: &str) -> Result<i32, ProcessError> {
            let output = self.answer(spec, Some(label));
            let shown = spec.to_string();
            let delay = self.inner.lock().delays.iter().rev().find(|(p, _)| shown.contains(p.as_str())).map(|(_, d)| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            output.map(|output| output.code)
        }

        async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ProcessError> {
            self.answer(spec, None)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProcessRunner;

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
