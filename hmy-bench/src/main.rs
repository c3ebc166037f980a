// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{env, path::PathBuf, sync::Arc};

use clap::{command, Parser};
use eyre::{eyre, Context, Result};
use prometheus::{Registry, TextEncoder};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use hmy_core::{
    cli::{CliConfig, HmyCli},
    config::{Print, Settings},
    environment::Environment,
    executor::SystemExecutor,
    importer::{ImportOptions, KeyImporter},
    metrics::Metrics,
    types::ShardIndex,
};

use crate::run_log::RunLog;

mod display;
mod run_log;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings file. Defaults are used if the file does not exist.
    #[clap(long, value_name = "FILE", default_value = Settings::DEFAULT_FILENAME)]
    settings_path: PathBuf,

    /// Path to the hmy binary (overrides the settings file).
    #[clap(long, value_name = "FILE")]
    binary: Option<PathBuf>,

    /// Script printing the environment of the binary (overrides the settings file).
    #[clap(long, value_name = "FILE")]
    setup_script: Option<PathBuf>,

    /// Print the collected prometheus metrics before exiting.
    #[clap(long)]
    print_metrics: bool,

    #[clap(subcommand)]
    operation: Operation,
}

#[derive(Parser)]
enum Operation {
    /// Load every validator key of a directory into the keystore and report their balances.
    LoadKeys {
        /// Directory holding the `.key` files.
        #[clap(long, value_name = "DIR")]
        keys_directory: Option<PathBuf>,

        /// Copy the key files into the keystore instead of importing them through the binary.
        #[clap(long, value_name = "BOOL")]
        quick_copy: Option<bool>,

        /// Do not query the balances of the loaded keys.
        #[clap(long)]
        no_balances: bool,

        /// The number of import workers.
        #[clap(long, value_name = "INT")]
        workers: Option<usize>,
    },
    /// Print the balance of a key.
    Balance {
        #[clap(long, value_name = "NAME")]
        alias: String,

        /// Index of the shard whose endpoint is queried.
        #[clap(long, value_name = "INT", default_value_t = 0)]
        shard: ShardIndex,
    },
    /// List the keys of the keystore.
    List,
    /// Remove a key from the keystore.
    Remove {
        #[clap(long, value_name = "NAME")]
        alias: String,
    },
    /// Recover a key from its mnemonic.
    Recover {
        #[clap(long, value_name = "NAME")]
        alias: String,

        #[clap(long, value_name = "WORDS")]
        mnemonic: String,

        #[clap(long, value_name = "STRING", default_value = "")]
        passphrase: String,
    },
    /// Print the version of the binary.
    Version,
    /// Write a settings file holding the default values.
    PrintSettings {
        #[clap(long, value_name = "FILE", default_value = Settings::DEFAULT_FILENAME)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    // Nice colored error messages.
    color_eyre::install()?;
    let args = Args::parse();

    if let Operation::PrintSettings { path } = &args.operation {
        Settings::default()
            .print(path)
            .wrap_err(format!("Failed to print settings file '{}'", path.display()))?;
        println!("Generated settings file: {}", path.display());
        return Ok(());
    }

    let settings = load_settings(&args)?;
    let run_log = RunLog::open(&settings.log_path).wrap_err(format!(
        "Failed to open log file '{}'",
        settings.log_path.display()
    ))?;
    init_tracing(run_log);
    tracing::warn!("{}", RunLog::separator());

    let registry = Registry::new();
    let metrics = Metrics::new(&registry);
    let cli = start_cli(&settings, metrics)?;
    tracing::warn!("[CLI Version] {}", cli.version());

    match args.operation {
        Operation::LoadKeys {
            keys_directory,
            quick_copy,
            no_balances,
            workers,
        } => {
            let mut options = settings.import_options();
            if let Some(quick_copy) = quick_copy {
                options.quick_copy = quick_copy;
            }
            if let Some(workers) = workers {
                options.workers = workers;
            }
            options.fetch_balances &= !no_balances;
            let directory = keys_directory.unwrap_or(settings.keys_directory);
            load_keys(&cli, options, directory)?
        }
        Operation::Balance { alias, shard } => {
            let balance = cli
                .get_balance(&alias, shard)
                .wrap_err(format!("Could not get balance for '{alias}'"))?
                .ok_or_else(|| eyre!("Unknown alias '{alias}'"))?;
            display::balance_table(&alias, &balance).printstd();
        }
        Operation::List => display::aliases_table(&cli.aliases()).printstd(),
        Operation::Remove { alias } => {
            cli.remove_address(&alias)
                .wrap_err(format!("Failed to remove '{alias}'"))?;
            tracing::info!("Removed '{alias}' from the keystore");
        }
        Operation::Recover {
            alias,
            mnemonic,
            passphrase,
        } => {
            let address = cli
                .recover_address(&alias, &mnemonic, &passphrase)
                .wrap_err(format!("Failed to recover '{alias}'"))?;
            println!("{alias}\t{address}");
        }
        Operation::Version => println!("{}", cli.version()),
        Operation::PrintSettings { .. } => unreachable!("handled before starting the CLI"),
    }

    if args.print_metrics {
        let metrics = TextEncoder
            .encode_to_string(&registry.gather())
            .wrap_err("Failed to encode metrics")?;
        print!("{metrics}");
    }
    Ok(())
}

/// Console output filtered by `RUST_LOG`, warnings and errors also go to the run log.
fn init_tracing(run_log: RunLog) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let console = fmt::layer().with_filter(filter);
    let file = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .without_time()
        .with_writer(run_log)
        .with_filter(LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = if args.settings_path.exists() {
        Settings::load(&args.settings_path).wrap_err(format!(
            "Failed to load settings file '{}'",
            args.settings_path.display()
        ))?
    } else {
        Settings::default()
    };
    if let Some(binary) = &args.binary {
        settings.binary_path = Some(binary.clone());
    }
    if let Some(script) = &args.setup_script {
        settings.setup_script = Some(script.clone());
    }
    Ok(settings)
}

/// Resolve the environment and the binary, then boot the wrapper. Any failure here is
/// fatal: nothing has been loaded yet.
fn start_cli(settings: &Settings, metrics: Arc<Metrics>) -> Result<HmyCli> {
    let environment = if settings.skip_setup_script {
        Environment::home_only()
    } else {
        let script = match &settings.setup_script {
            Some(script) => script.clone(),
            None => Environment::default_setup_script(&SystemExecutor)
                .wrap_err("Failed to locate the setup script")?,
        };
        Environment::from_setup_script(&script, &SystemExecutor).wrap_err(format!(
            "Failed to load the environment from '{}'",
            script.display()
        ))?
    };

    let binary_path = match &settings.binary_path {
        Some(path) => path.clone(),
        None => CliConfig::discover_binary(&env::current_dir()?),
    };
    tracing::info!("Using binary '{}'", binary_path.display());

    let config = CliConfig {
        binary_path,
        environment,
        endpoints: settings.endpoints.clone(),
    };
    HmyCli::start(config, SystemExecutor, metrics).wrap_err("Failed to start the CLI wrapper")
}

fn load_keys(cli: &HmyCli, options: ImportOptions, directory: PathBuf) -> Result<()> {
    let report = KeyImporter::new(cli, options)
        .load(&directory)
        .wrap_err(format!(
            "Failed to load keys from '{}'",
            directory.display()
        ))?;

    display::summary_table(&report).printstd();
    if !report.failed.is_empty() {
        display::failures_table(&report).printstd();
    }
    if !report.balances.is_empty() {
        display::funds_table(&report).printstd();
    }
    Ok(())
}
