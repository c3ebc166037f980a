// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::BTreeMap,
    fs,
    ops::Range,
    path::{Path, PathBuf},
    thread,
};

use crate::{
    balance::BalanceReport,
    cli::HmyCli,
    error::{HarnessError, HarnessResult},
    executor::Executor,
    metrics::{KEY_EXISTING, KEY_FAILED, KEY_IMPORTED, KEY_SKIPPED},
    pool::WorkerPool,
    types::{self, Alias, ShardIndex, KEY_FILE_SUFFIX},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Copy key files into the keystore layout rather than calling `keys import-ks`.
    pub quick_copy: bool,
    /// Query the balance of every loaded key.
    pub fetch_balances: bool,
    pub alias_prefix: String,
    pub workers: usize,
    /// Shard whose endpoint answers the balance queries.
    pub balance_shard: ShardIndex,
}

impl ImportOptions {
    pub fn default_workers() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            quick_copy: false,
            fetch_balances: true,
            alias_prefix: "testnetVal".to_string(),
            workers: Self::default_workers(),
            balance_shard: 0,
        }
    }
}

/// Outcome of loading a key directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    /// Aliases added to the keystore by this run.
    pub imported: Vec<Alias>,
    /// Aliases that already resolved to an address.
    pub existing: Vec<Alias>,
    /// Aliases whose key could not be loaded, with the reason.
    pub failed: Vec<(Alias, String)>,
    /// Balances of the loaded keys, when requested.
    pub balances: BTreeMap<Alias, BalanceReport>,
}

impl ImportReport {
    fn merge(mut self, other: Self) -> Self {
        self.imported.extend(other.imported);
        self.existing.extend(other.existing);
        self.failed.extend(other.failed);
        self.balances.extend(other.balances);
        self
    }
}

/// Loads a directory of `.key` files into the keystore of the binary, spreading the
/// files over a pool of workers.
pub struct KeyImporter<'a, E: Executor> {
    cli: &'a HmyCli<E>,
    options: ImportOptions,
}

impl<'a, E: Executor> KeyImporter<'a, E> {
    pub fn new(cli: &'a HmyCli<E>, options: ImportOptions) -> Self {
        Self { cli, options }
    }

    /// Load every key file of `directory`. The directory is listed once; files added
    /// while the run is in progress are ignored.
    pub fn load(&self, directory: &Path) -> HarnessResult<ImportReport> {
        if !directory.is_dir() {
            return Err(HarnessError::NotADirectory(directory.to_path_buf()));
        }
        let directory = fs::canonicalize(directory)
            .map_err(|e| HarnessError::filesystem("resolve", directory, e))?;
        let files = Self::snapshot(&directory)?;

        let pool = WorkerPool::new(self.options.workers);
        let ranges = pool.partition(files.len());
        tracing::info!(
            "Loading {} files from '{}' with {} workers",
            files.len(),
            directory.display(),
            ranges.len()
        );

        let reports = pool.run(ranges, |range| self.load_range(&directory, &files, range))?;
        let report = reports
            .into_iter()
            .fold(ImportReport::default(), ImportReport::merge);
        tracing::info!(
            "Loaded keys: {} imported, {} existing, {} failed",
            report.imported.len(),
            report.existing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// File names of `directory`, sorted so aliases are stable across runs.
    fn snapshot(directory: &Path) -> HarnessResult<Vec<String>> {
        let entries =
            fs::read_dir(directory).map_err(|e| HarnessError::filesystem("list", directory, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarnessError::filesystem("list", directory, e))?;
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();
        Ok(files)
    }

    fn load_range(
        &self,
        directory: &Path,
        files: &[String],
        range: Range<usize>,
    ) -> ImportReport {
        let metrics = self.cli.metrics();
        let mut report = ImportReport::default();

        for index in range {
            let file = &files[index];
            if !file.ends_with(KEY_FILE_SUFFIX) {
                metrics.key_processed(KEY_SKIPPED);
                continue;
            }
            let alias = types::alias_for_index(&self.options.alias_prefix, index);
            let path = directory.join(file);

            let loaded = match self.cli.get_address(&alias) {
                Ok(Some(_)) => {
                    tracing::debug!("Key ({index}) {file} already loaded as '{alias}'");
                    report.existing.push(alias.clone());
                    Ok(KEY_EXISTING)
                }
                Ok(None) => {
                    tracing::info!("Adding key: ({index}) {file}");
                    self.load_key(&path, file, &alias).map(|_| {
                        report.imported.push(alias.clone());
                        KEY_IMPORTED
                    })
                }
                Err(e) => Err(e),
            };
            match loaded {
                Ok(outcome) => metrics.key_processed(outcome),
                Err(e) => {
                    tracing::warn!("Could not import validator key: {file} (name: {alias}): {e}");
                    metrics.key_processed(KEY_FAILED);
                    report.failed.push((alias, e.to_string()));
                    continue;
                }
            }

            if self.options.fetch_balances {
                tracing::info!("Fetching balance: ({index}) {file}");
                match self.cli.get_balance(&alias, self.options.balance_shard) {
                    Ok(Some(balance)) => {
                        report.balances.insert(alias, balance);
                    }
                    Ok(None) => tracing::warn!("No address for '{alias}', skipping its balance"),
                    Err(e) => tracing::warn!("Could not get balance for '{alias}': {e}"),
                }
            }
        }
        report
    }

    fn load_key(&self, path: &Path, file: &str, alias: &str) -> HarnessResult<()> {
        if !self.options.quick_copy {
            return self.cli.import_keystore(path, alias);
        }

        let account_directory: PathBuf = self.cli.keystore_path().join(alias);
        fs::create_dir_all(&account_directory)
            .map_err(|e| HarnessError::filesystem("create", &account_directory, e))?;
        let target = account_directory.join(file);
        fs::copy(path, &target).map_err(|e| HarnessError::filesystem("copy", target, e))?;
        Ok(())
    }
}
