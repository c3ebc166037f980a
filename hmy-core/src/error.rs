// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::types::{Alias, ShardIndex};

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Setup script '{}' does not exist", .0.display())]
    MissingSetupScript(PathBuf),

    #[error("Failed to resolve the environment: {0}")]
    Environment(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected output from '{command}': {reason}")]
    UnexpectedOutput { command: String, reason: String },

    #[error("Failed to decode balance response: {0}")]
    BalanceDecode(#[source] serde_json::Error),

    #[error("Shard {shard} is out of range ({shards} endpoints configured)")]
    ShardOutOfRange { shard: ShardIndex, shards: usize },

    #[error("'{}' is not a valid keystore path", .0.display())]
    InvalidKeystore(PathBuf),

    #[error("'{0}' is not a valid alias: it must name a single keystore entry")]
    InvalidAlias(Alias),

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to {action} '{}': {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Keystore import of '{alias}' was not confirmed: {response}")]
    ImportRejected { alias: Alias, response: String },

    #[error("Interactive session failed while {state}: {reason}")]
    Interactive { state: String, reason: String },

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl HarnessError {
    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}
