// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::importer::ImportOptions;

pub trait Print: Serialize + DeserializeOwned {
    fn print<P: AsRef<Path>>(&self, path: P) -> Result<(), io::Error> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, content)
    }

    fn load<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let content = fs::read_to_string(&path)?;
        let object =
            serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(object)
    }
}

/// Everything needed to drive a benchmark run against the `hmy` binary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Path to the `hmy` binary. Looked up in the working tree when unset.
    pub binary_path: Option<PathBuf>,
    /// Shard API endpoints. Order matters: the index is the shard id.
    pub endpoints: Vec<String>,
    /// Script printing the binary's environment as JSON. Derived from `GOPATH` when unset.
    pub setup_script: Option<PathBuf>,
    /// Skip the setup script entirely and run the binary with only `HOME` set.
    pub skip_setup_script: bool,
    /// Directory holding the validator `.key` files to import.
    pub keys_directory: PathBuf,
    /// Prefix of the aliases given to imported keys.
    pub alias_prefix: String,
    /// Number of import workers. Defaults to the available hardware parallelism.
    pub workers: Option<usize>,
    /// Copy key files straight into the keystore instead of calling `keys import-ks`.
    pub quick_copy: bool,
    /// Query the balance of every key after loading it.
    pub fetch_balances: bool,
    /// Append-only log receiving warnings and run separators.
    pub log_path: PathBuf,
}

impl Settings {
    pub const DEFAULT_FILENAME: &'static str = "settings.yaml";

    pub const DEFAULT_ENDPOINTS: [&'static str; 2] =
        ["https://api.s0.b.hmny.io/", "https://api.s1.b.hmny.io/"];
    pub const DEFAULT_KEYS_DIRECTORY: &'static str = "testnet_validator_keys";
    pub const DEFAULT_ALIAS_PREFIX: &'static str = "testnetVal";
    pub const DEFAULT_LOG_PATH: &'static str = "benchmark.log";

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            quick_copy: self.quick_copy,
            fetch_balances: self.fetch_balances,
            alias_prefix: self.alias_prefix.clone(),
            workers: self.workers.unwrap_or_else(ImportOptions::default_workers),
            ..ImportOptions::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary_path: None,
            endpoints: Self::DEFAULT_ENDPOINTS
                .iter()
                .map(|x| x.to_string())
                .collect(),
            setup_script: None,
            skip_setup_script: false,
            keys_directory: Self::DEFAULT_KEYS_DIRECTORY.into(),
            alias_prefix: Self::DEFAULT_ALIAS_PREFIX.to_string(),
            workers: None,
            quick_copy: true,
            fetch_balances: true,
            log_path: Self::DEFAULT_LOG_PATH.into(),
        }
    }
}

impl Print for Settings {}
