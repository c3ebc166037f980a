// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::VecDeque,
    fs, io,
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;
use prometheus::Registry;
use tempfile::TempDir;

use crate::{
    cli::{CliConfig, HmyCli},
    environment::Environment,
    executor::{CommandOutput, Executor, InteractiveChild},
    interactive::{PromptChannel, RecoveryPrompts},
    metrics::Metrics,
    types,
};

pub fn test_metrics() -> Arc<Metrics> {
    Metrics::new(&Registry::new())
}

pub fn test_cli(fake: &FakeHmy) -> HmyCli<FakeHmy> {
    HmyCli::start(fake.config(), fake.clone(), test_metrics()).unwrap()
}

/// A directory holding `count` key files named `validator-<i>.key`.
pub fn write_key_files(count: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..count {
        fs::write(dir.path().join(format!("validator-{i}.key")), "{}").unwrap();
    }
    dir
}

/// Plays back canned output and records the lines sent to it.
pub struct ScriptedChannel {
    output: VecDeque<String>,
    buffer: String,
    sent: Vec<String>,
}

impl ScriptedChannel {
    pub fn new<I, S>(output: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output: output.into_iter().map(Into::into).collect(),
            buffer: String::new(),
            sent: Vec::new(),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.clone()
    }
}

impl PromptChannel for ScriptedChannel {
    fn expect(&mut self, pattern: &str) -> io::Result<bool> {
        loop {
            if let Some(position) = self.buffer.find(pattern) {
                self.buffer.drain(..position + pattern.len());
                return Ok(true);
            }
            match self.output.pop_front() {
                Some(chunk) => self.buffer.push_str(&chunk),
                None => return Ok(false),
            }
        }
    }

    fn expect_eof(&mut self) -> io::Result<String> {
        let mut rest = std::mem::take(&mut self.buffer);
        rest.extend(self.output.drain(..));
        Ok(rest)
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.sent.push(line.to_string());
        Ok(())
    }
}

/// An in-process stand-in for the `hmy` binary, backed by a temporary keystore.
#[derive(Clone)]
pub struct FakeHmy {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    keystore: TempDir,
    state: Mutex<FakeState>,
}

struct FakeState {
    version: String,
    keystore_location: Option<String>,
    keys: Vec<(String, String)>,
    listing: Option<String>,
    import_response: Option<String>,
    balance_response: String,
    fail_balance: bool,
    calls: Vec<Vec<String>>,
    recovery_answers: Vec<String>,
    recovery_script: Option<(Vec<String>, i32)>,
    recovery_waits: usize,
}

impl Default for FakeHmy {
    fn default() -> Self {
        let state = FakeState {
            version: "Harmony (C) 2020. hmy, version v262-test".to_string(),
            keystore_location: None,
            keys: Vec::new(),
            listing: None,
            import_response: None,
            balance_response: "[{\"shard\": 0, \"amount\": 10.0}, {\"shard\": 1, \"amount\": 0}]"
                .to_string(),
            fail_balance: false,
            calls: Vec::new(),
            recovery_answers: Vec::new(),
            recovery_script: None,
            recovery_waits: 0,
        };
        Self {
            inner: Arc::new(FakeInner {
                keystore: tempfile::tempdir().unwrap(),
                state: Mutex::new(state),
            }),
        }
    }
}

impl FakeHmy {
    pub fn with_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        let fake = Self::default();
        for (alias, address) in keys {
            fake.add_key(alias, address);
        }
        fake
    }

    pub fn with_listing(listing: &str) -> Self {
        let fake = Self::default();
        fake.inner.state.lock().listing = Some(listing.to_string());
        fake
    }

    pub fn config(&self) -> CliConfig {
        CliConfig {
            binary_path: "/opt/harmony/bin/hmy".into(),
            environment: Environment::default(),
            endpoints: vec![
                "http://shard0.test/".to_string(),
                "http://shard1.test/".to_string(),
            ],
        }
    }

    pub fn keystore_path(&self) -> &Path {
        self.inner.keystore.path()
    }

    pub fn add_key(&self, alias: &str, address: &str) {
        self.inner
            .state
            .lock()
            .keys
            .push((alias.to_string(), address.to_string()));
    }

    pub fn set_version(&self, version: &str) {
        self.inner.state.lock().version = version.to_string();
    }

    pub fn set_keystore_location(&self, location: &str) {
        self.inner.state.lock().keystore_location = Some(location.to_string());
    }

    pub fn set_import_response(&self, response: &str) {
        self.inner.state.lock().import_response = Some(response.to_string());
    }

    pub fn set_balance_response(&self, response: &str) {
        self.inner.state.lock().balance_response = response.to_string();
    }

    pub fn fail_balance(&self, fail: bool) {
        self.inner.state.lock().fail_balance = fail;
    }

    /// Number of invocations with exactly these arguments.
    pub fn calls_to(&self, args: &[&str]) -> usize {
        self.inner
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| call.iter().map(String::as_str).eq(args.iter().copied()))
            .count()
    }

    /// Number of invocations whose argument line starts with `prefix`.
    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.inner
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| call.join(" ").starts_with(prefix))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.inner.state.lock().calls.len()
    }

    pub fn recovery_answers(&self) -> Vec<String> {
        self.inner.state.lock().recovery_answers.clone()
    }

    /// Replace the output of `keys add --recover` and the code it exits with.
    pub fn set_recovery_script<I>(&self, output: I, code: i32)
    where
        I: IntoIterator<Item = String>,
    {
        self.inner.state.lock().recovery_script = Some((output.into_iter().collect(), code));
    }

    /// Number of recovery children that were waited for.
    pub fn recovery_waits(&self) -> usize {
        self.inner.state.lock().recovery_waits
    }

    fn address_of(alias: &str) -> String {
        format!("one1{}", alias.to_lowercase())
    }

    /// Registered keys followed by any keystore directory they do not cover.
    fn listing(&self, state: &FakeState) -> String {
        if let Some(listing) = &state.listing {
            return listing.clone();
        }
        let mut listing = "NAME\t\t\t\t\t\tADDRESS\n".to_string();
        for (alias, address) in &state.keys {
            listing.push_str(&format!("{alias}\t{address}\n"));
        }
        let mut copied: Vec<_> = fs::read_dir(self.keystore_path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|alias| !state.keys.iter().any(|(known, _)| known == alias))
            .collect();
        copied.sort();
        for alias in copied {
            listing.push_str(&format!("{alias}\t{}\n", Self::address_of(&alias)));
        }
        listing
    }

    fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn fail(stderr: impl Into<String>) -> CommandOutput {
        CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl Executor for FakeHmy {
    fn run(
        &self,
        _program: &Path,
        args: &[String],
        _environment: Option<&Environment>,
    ) -> io::Result<CommandOutput> {
        let mut state = self.inner.state.lock();
        state.calls.push(args.to_vec());

        let args: Vec<_> = args.iter().map(String::as_str).collect();
        let output = match args[..] {
            ["version"] => CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: state.version.clone(),
            },
            ["keys", "location"] => {
                let location = state
                    .keystore_location
                    .clone()
                    .unwrap_or_else(|| self.keystore_path().display().to_string());
                Self::ok(format!("{location}\n"))
            }
            ["keys", "list"] => Self::ok(self.listing(&state)),
            ["keys", "import-ks", _, alias] => match state.import_response.clone() {
                Some(response) => Self::ok(response),
                None => {
                    state.keys.push((alias.to_string(), Self::address_of(alias)));
                    Self::ok(format!("{}\n", types::import_confirmation(alias)))
                }
            },
            ["balance", _, node] if node.starts_with("--node=") => {
                if state.fail_balance {
                    Self::fail("rpc error: connection refused")
                } else {
                    Self::ok(state.balance_response.clone())
                }
            }
            _ => Self::fail(format!("Error: unknown command {args:?}")),
        };
        Ok(output)
    }

    fn spawn_interactive(
        &self,
        _program: &Path,
        args: &[String],
        _environment: &Environment,
    ) -> io::Result<Box<dyn InteractiveChild>> {
        let mut state = self.inner.state.lock();
        state.calls.push(args.to_vec());

        let args: Vec<_> = args.iter().map(String::as_str).collect();
        let ["keys", "add", alias, "--recover", "--passphrase"] = args[..] else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unknown command"));
        };
        let (output, code) = match state.recovery_script.clone() {
            Some((output, code)) => (output, Some(code)),
            None => {
                let prompts = RecoveryPrompts::default();
                let output = vec![
                    format!("{}:", prompts.passphrase),
                    format!("{}:", prompts.passphrase_repeat),
                    format!("{} to recover keys from", prompts.mnemonic),
                ];
                (output, None)
            }
        };
        Ok(Box::new(FakeRecovery {
            fake: self.clone(),
            alias: alias.to_string(),
            channel: ScriptedChannel::new(output),
            code,
        }))
    }
}

/// The interactive side of `keys add --recover`.
struct FakeRecovery {
    fake: FakeHmy,
    alias: String,
    channel: ScriptedChannel,
    /// Forced exit code; `None` accepts matching answers.
    code: Option<i32>,
}

impl PromptChannel for FakeRecovery {
    fn expect(&mut self, pattern: &str) -> io::Result<bool> {
        self.channel.expect(pattern)
    }

    fn expect_eof(&mut self) -> io::Result<String> {
        self.channel.expect_eof()
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.channel.send_line(line)
    }
}

impl InteractiveChild for FakeRecovery {
    fn wait(&mut self) -> io::Result<Option<i32>> {
        let answers = self.channel.sent();
        let accepted = answers.len() == 3 && answers[0] == answers[1];
        {
            let mut state = self.fake.inner.state.lock();
            state.recovery_answers = answers;
            state.recovery_waits += 1;
        }
        if let Some(code) = self.code {
            return Ok(Some(code));
        }
        if !accepted {
            return Ok(Some(1));
        }
        self.fake.add_key(&self.alias, &FakeHmy::address_of(&self.alias));
        Ok(Some(0))
    }
}
