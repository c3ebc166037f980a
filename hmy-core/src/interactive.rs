// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt::Display, io};

use crate::error::{HarnessError, HarnessResult};

/// A conversation with a program that prints prompts and reads answers.
pub trait PromptChannel {
    /// Consume output until `pattern` appears. Returns `false` if the output ended first.
    fn expect(&mut self, pattern: &str) -> io::Result<bool>;

    /// Consume output until the program closes it and return what was not matched yet.
    fn expect_eof(&mut self) -> io::Result<String>;

    fn send_line(&mut self, line: &str) -> io::Result<()>;
}

/// Where a `keys add --recover --passphrase` conversation currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryState {
    AwaitingPassphrase,
    AwaitingPassphraseRepeat,
    AwaitingMnemonic,
    Done,
}

impl RecoveryState {
    fn next(self) -> Self {
        match self {
            Self::AwaitingPassphrase => Self::AwaitingPassphraseRepeat,
            Self::AwaitingPassphraseRepeat => Self::AwaitingMnemonic,
            Self::AwaitingMnemonic | Self::Done => Self::Done,
        }
    }
}

impl Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::AwaitingPassphrase => "awaiting passphrase",
            Self::AwaitingPassphraseRepeat => "awaiting passphrase repeat",
            Self::AwaitingMnemonic => "awaiting mnemonic",
            Self::Done => "done",
        };
        f.write_str(state)
    }
}

/// Prompt fragments printed by the binary, one per waiting state.
#[derive(Clone, Debug)]
pub struct RecoveryPrompts {
    pub passphrase: String,
    pub passphrase_repeat: String,
    pub mnemonic: String,
}

impl Default for RecoveryPrompts {
    fn default() -> Self {
        Self {
            passphrase: "Enter passphrase".to_string(),
            passphrase_repeat: "Repeat the passphrase".to_string(),
            mnemonic: "Enter mnemonic".to_string(),
        }
    }
}

/// Answers the prompts of a mnemonic recovery, one state at a time.
pub struct RecoveryFlow {
    state: RecoveryState,
    prompts: RecoveryPrompts,
    passphrase: String,
    mnemonic: String,
}

impl RecoveryFlow {
    pub fn new(passphrase: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self::with_prompts(passphrase, mnemonic, RecoveryPrompts::default())
    }

    pub fn with_prompts(
        passphrase: impl Into<String>,
        mnemonic: impl Into<String>,
        prompts: RecoveryPrompts,
    ) -> Self {
        Self {
            state: RecoveryState::AwaitingPassphrase,
            prompts,
            passphrase: passphrase.into(),
            mnemonic: mnemonic.into(),
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// The prompt awaited in the current state and the answer to send back.
    fn exchange(&self) -> Option<(&str, &str)> {
        match self.state {
            RecoveryState::AwaitingPassphrase => {
                Some((self.prompts.passphrase.as_str(), self.passphrase.as_str()))
            }
            RecoveryState::AwaitingPassphraseRepeat => Some((
                self.prompts.passphrase_repeat.as_str(),
                self.passphrase.as_str(),
            )),
            RecoveryState::AwaitingMnemonic => {
                Some((self.prompts.mnemonic.as_str(), self.mnemonic.as_str()))
            }
            RecoveryState::Done => None,
        }
    }

    /// Perform the exchange of the current state and advance.
    pub fn step<C: PromptChannel + ?Sized>(
        &mut self,
        channel: &mut C,
    ) -> HarnessResult<RecoveryState> {
        match self.exchange() {
            Some((prompt, answer)) => {
                if !channel.expect(prompt).map_err(|e| self.failure(e))? {
                    return Err(self.failure(format!("output ended before prompt '{prompt}'")));
                }
                channel.send_line(answer).map_err(|e| self.failure(e))?;
            }
            None => {
                channel.expect_eof().map_err(|e| self.failure(e))?;
            }
        }
        self.state = self.state.next();
        Ok(self.state)
    }

    /// Run the conversation to completion, including the end of the program's output.
    /// Returns whatever the program printed after the last prompt.
    pub fn drive<C: PromptChannel + ?Sized>(
        &mut self,
        channel: &mut C,
    ) -> HarnessResult<String> {
        while self.state != RecoveryState::Done {
            self.step(channel)?;
        }
        channel.expect_eof().map_err(|e| self.failure(e))
    }

    fn failure(&self, reason: impl Display) -> HarnessError {
        HarnessError::Interactive {
            state: self.state.to_string(),
            reason: reason.to_string(),
        }
    }
}
