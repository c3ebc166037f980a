// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod balance;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod importer;
pub mod interactive;
pub mod keys;
pub mod metrics;
pub mod pool;
#[cfg(test)]
mod test_util;
pub mod types;
