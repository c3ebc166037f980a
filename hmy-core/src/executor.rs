// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    io::{self, Read, Write},
    path::Path,
    process::{Child, ChildStdin, Command, Stdio},
    thread,
};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{environment::Environment, interactive::PromptChannel};

/// Captured result of a command that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A child process whose prompts are answered by the caller.
pub trait InteractiveChild: PromptChannel + Send {
    /// Close the child's input and wait for it to exit.
    fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Runs external programs. The seam between the harness and the operating system.
pub trait Executor: Send + Sync {
    /// Run `program` to completion. The child sees exactly `environment`, or the
    /// caller's own environment when none is given.
    fn run(
        &self,
        program: &Path,
        args: &[String],
        environment: Option<&Environment>,
    ) -> io::Result<CommandOutput>;

    /// Spawn `program` with piped standard streams and hand it back to the caller.
    fn spawn_interactive(
        &self,
        program: &Path,
        args: &[String],
        environment: &Environment,
    ) -> io::Result<Box<dyn InteractiveChild>>;
}

/// Executes programs with `std::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn command(program: &Path, args: &[String], environment: Option<&Environment>) -> Command {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(environment) = environment {
            command.env_clear().envs(environment.iter());
        }
        command
    }
}

impl Executor for SystemExecutor {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        environment: Option<&Environment>,
    ) -> io::Result<CommandOutput> {
        let output = Self::command(program, args, environment)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn_interactive(
        &self,
        program: &Path,
        args: &[String],
        environment: &Environment,
    ) -> io::Result<Box<dyn InteractiveChild>> {
        let child = Self::command(program, args, Some(environment))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Box::new(ChildSession::start(child)?))
    }
}

/// Interactive session over the standard streams of a spawned child. Output of
/// both stdout and stderr is forwarded by reader threads into a single stream,
/// since prompts may be written to either.
pub struct ChildSession {
    child: Child,
    stdin: Option<ChildStdin>,
    receiver: UnboundedReceiver<Vec<u8>>,
    buffer: Vec<u8>,
}

impl ChildSession {
    const READ_CHUNK: usize = 1024;

    fn start(mut child: Child) -> io::Result<Self> {
        let missing = |stream: &str| io::Error::new(io::ErrorKind::BrokenPipe, format!("no {stream}"));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (sender, receiver) = unbounded_channel();
        Self::forward("hmy-stdout", stdout, sender.clone())?;
        Self::forward("hmy-stderr", stderr, sender)?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            receiver,
            buffer: Vec::new(),
        })
    }

    fn forward<R: Read + Send + 'static>(
        name: &str,
        mut reader: R,
        sender: UnboundedSender<Vec<u8>>,
    ) -> io::Result<()> {
        thread::Builder::new().name(name.to_string()).spawn(move || {
            let mut chunk = [0u8; Self::READ_CHUNK];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if sender.send(chunk[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;
        Ok(())
    }
}

impl PromptChannel for ChildSession {
    fn expect(&mut self, pattern: &str) -> io::Result<bool> {
        let pattern = pattern.as_bytes();
        loop {
            if let Some(position) = find(&self.buffer, pattern) {
                self.buffer.drain(..position + pattern.len());
                return Ok(true);
            }
            match self.receiver.blocking_recv() {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => return Ok(false),
            }
        }
    }

    fn expect_eof(&mut self) -> io::Result<String> {
        while let Some(chunk) = self.receiver.blocking_recv() {
            self.buffer.extend_from_slice(&chunk);
        }
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Ok(rest)
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin already closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()
    }
}

impl InteractiveChild for ChildSession {
    fn wait(&mut self) -> io::Result<Option<i32>> {
        drop(self.stdin.take());
        Ok(self.child.wait()?.code())
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
