// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    balance::BalanceReport,
    environment::Environment,
    error::{HarnessError, HarnessResult},
    executor::{CommandOutput, Executor, InteractiveChild, SystemExecutor},
    interactive::RecoveryFlow,
    keys::AddressBook,
    metrics::Metrics,
    types::{self, Address, Alias, ShardIndex, BINARY_NAME_TOKENS},
};

/// What the wrapper needs to know before talking to the binary.
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub binary_path: PathBuf,
    pub environment: Environment,
    /// Shard API endpoints. The index is the shard id.
    pub endpoints: Vec<String>,
}

impl CliConfig {
    pub const DEFAULT_BINARY_NAME: &'static str = "hmy";

    /// Look for the binary under `root`, falling back on the bare name (resolved through `PATH`).
    pub fn discover_binary(root: &Path) -> PathBuf {
        let pattern = root.join("**").join(Self::DEFAULT_BINARY_NAME);
        glob::glob(&pattern.to_string_lossy())
            .ok()
            .and_then(|paths| paths.filter_map(Result::ok).find(|path| path.is_file()))
            .unwrap_or_else(|| Self::DEFAULT_BINARY_NAME.into())
    }
}

/// Wrapper around the `hmy` binary. Keeps a cache of the keystore's aliases that is
/// resynced from `keys list` on demand.
#[derive(Debug)]
pub struct HmyCli<E: Executor = SystemExecutor> {
    binary_path: PathBuf,
    environment: Environment,
    endpoints: Vec<String>,
    executor: E,
    metrics: Arc<Metrics>,
    version: String,
    keystore_path: PathBuf,
    addresses: RwLock<AddressBook>,
}

impl<E: Executor> HmyCli<E> {
    /// Query the binary's version, locate its keystore and load the current aliases.
    pub fn start(config: CliConfig, executor: E, metrics: Arc<Metrics>) -> HarnessResult<Self> {
        let mut cli = Self {
            binary_path: config.binary_path,
            environment: config.environment,
            endpoints: config.endpoints,
            executor,
            metrics,
            version: String::new(),
            keystore_path: PathBuf::new(),
            addresses: RwLock::new(AddressBook::default()),
        };
        cli.version = cli.query_version()?;
        cli.keystore_path = cli.query_keystore_path()?;
        cli.sync_addresses()?;
        tracing::info!(
            "Loaded {} keys from keystore '{}'",
            cli.addresses.read().len(),
            cli.keystore_path.display()
        );
        Ok(cli)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn keystore_path(&self) -> &Path {
        &self.keystore_path
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Snapshot of the cached aliases and their addresses.
    pub fn aliases(&self) -> Vec<(Alias, Address)> {
        self.addresses
            .read()
            .iter()
            .map(|(alias, address)| (alias.clone(), address.clone()))
            .collect()
    }

    /// The binary prints its version on stderr; an empty stream means something is off.
    fn query_version(&self) -> HarnessResult<String> {
        let args = vec!["version".to_string()];
        let output = self.execute(&args)?;
        let version = output.stderr.trim();
        if version.is_empty() {
            return Err(HarnessError::UnexpectedOutput {
                command: self.command_line(&args),
                reason: format!("expected the version on stderr (exit code {:?})", output.code),
            });
        }
        Ok(version.to_string())
    }

    fn query_keystore_path(&self) -> HarnessResult<PathBuf> {
        let response = self.single_call("keys location")?;
        let path = PathBuf::from(response.trim());
        if !path.exists() {
            return Err(HarnessError::InvalidKeystore(path));
        }
        Ok(path)
    }

    /// Refresh the cache from the binary's keystore listing.
    pub fn sync_addresses(&self) -> HarnessResult<()> {
        let command = "keys list";
        let response = self.single_call(command)?;
        let entries =
            AddressBook::parse_listing(&response).map_err(|e| HarnessError::UnexpectedOutput {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
        self.addresses.write().merge(entries);
        Ok(())
    }

    /// The address of `alias`. A miss triggers a single resync before giving up.
    pub fn get_address(&self, alias: &str) -> HarnessResult<Option<Address>> {
        if let Some(address) = self.addresses.read().get(alias) {
            return Ok(Some(address.clone()));
        }
        self.sync_addresses()?;
        Ok(self.addresses.read().get(alias).cloned())
    }

    /// Delete the keystore entry of `alias`. A missing entry on disk is not an error.
    /// Aliases that do not name a single entry under the keystore are rejected.
    pub fn remove_address(&self, alias: &str) -> HarnessResult<()> {
        if !types::is_keystore_entry(alias) {
            return Err(HarnessError::InvalidAlias(alias.to_string()));
        }
        let path = self.keystore_path.join(alias);
        match fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!("Removed keystore entry '{}'", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Keystore entry '{}' already absent", path.display())
            }
            Err(e) => return Err(HarnessError::filesystem("delete", path, e)),
        }
        self.addresses.write().remove(alias);
        Ok(())
    }

    /// Balance of `alias` as seen by the endpoint of `shard`. `None` if the alias is unknown.
    pub fn get_balance(
        &self,
        alias: &str,
        shard: ShardIndex,
    ) -> HarnessResult<Option<BalanceReport>> {
        let Some(endpoint) = self.endpoints.get(shard) else {
            return Err(HarnessError::ShardOutOfRange {
                shard,
                shards: self.endpoints.len(),
            });
        };
        let Some(address) = self.get_address(alias)? else {
            return Ok(None);
        };

        let shard_label = shard.to_string();
        let result = self
            .single_call(&format!("balance {address} --node={endpoint}"))
            .and_then(|response| BalanceReport::decode(&response));
        let outcome = if result.is_ok() { "ok" } else { "error" };
        self.metrics
            .balance_queries_total
            .with_label_values(&[shard_label.as_str(), outcome])
            .inc();
        result.map(Some)
    }

    /// Import a keystore file under `alias`, checking the binary's confirmation message.
    pub fn import_keystore(&self, path: &Path, alias: &str) -> HarnessResult<()> {
        let args = vec![
            "keys".to_string(),
            "import-ks".to_string(),
            path.display().to_string(),
            alias.to_string(),
        ];
        let response = self.call(&args)?;
        if !types::is_import_confirmed(&response, alias) {
            return Err(HarnessError::ImportRejected {
                alias: alias.to_string(),
                response: response.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Recover `alias` from a mnemonic through `keys add --recover --passphrase` and
    /// return the resulting address.
    pub fn recover_address(
        &self,
        alias: &str,
        mnemonic: &str,
        passphrase: &str,
    ) -> HarnessResult<Address> {
        let command = format!("keys add {alias} --recover --passphrase");
        let mut child = self.expect_call(&command)?;
        // The child is reaped whether or not the conversation went through.
        let conversation = RecoveryFlow::new(passphrase, mnemonic).drive(&mut *child);
        let code = child.wait().map_err(|e| HarnessError::Spawn {
            command: command.clone(),
            source: e,
        })?;
        let trailing = conversation?;
        if code != Some(0) {
            return Err(HarnessError::CommandFailed {
                command,
                code,
                stderr: trailing.trim().to_string(),
            });
        }

        self.sync_addresses()?;
        self.addresses
            .read()
            .get(alias)
            .cloned()
            .ok_or_else(|| HarnessError::UnexpectedOutput {
                command,
                reason: format!("'{alias}' missing from the keystore after recovery"),
            })
    }

    /// Run the binary with a whitespace-separated argument string and return its stdout.
    /// A leading binary name is ignored.
    pub fn single_call(&self, command: &str) -> HarnessResult<String> {
        self.call(&self.tokenize(command))
    }

    /// Spawn the binary for a conversation driven by the caller.
    pub fn expect_call(&self, command: &str) -> HarnessResult<Box<dyn InteractiveChild>> {
        let args = self.tokenize(command);
        self.executor
            .spawn_interactive(&self.binary_path, &args, &self.environment)
            .map_err(|e| HarnessError::Spawn {
                command: self.command_line(&args),
                source: e,
            })
    }

    fn call(&self, args: &[String]) -> HarnessResult<String> {
        let output = self.execute(args)?;
        if !output.success() {
            return Err(HarnessError::CommandFailed {
                command: self.command_line(args),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn execute(&self, args: &[String]) -> HarnessResult<CommandOutput> {
        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        let result = self
            .executor
            .run(&self.binary_path, args, Some(&self.environment));
        let outcome = match &result {
            Ok(output) if output.success() => "ok",
            Ok(_) => "failed",
            Err(_) => "spawn_error",
        };
        self.metrics
            .cli_calls_total
            .with_label_values(&[subcommand, outcome])
            .inc();
        result.map_err(|e| HarnessError::Spawn {
            command: self.command_line(args),
            source: e,
        })
    }

    fn tokenize(&self, command: &str) -> Vec<String> {
        let mut tokens = command.split_whitespace().peekable();
        if let Some(first) = tokens.peek() {
            let binary = self.binary_path.to_string_lossy();
            let file_name = self.binary_path.file_name().map(|x| x.to_string_lossy());
            if BINARY_NAME_TOKENS.contains(first)
                || *first == binary
                || file_name.is_some_and(|name| *first == name)
            {
                tokens.next();
            }
        }
        tokens.map(str::to_string).collect()
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.binary_path.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
