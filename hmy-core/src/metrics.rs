// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use prometheus::{register_int_counter_vec_with_registry, IntCounterVec, Registry};

/// Outcome labels of `keys_processed_total`.
pub const KEY_IMPORTED: &str = "imported";
pub const KEY_EXISTING: &str = "existing";
pub const KEY_FAILED: &str = "failed";
pub const KEY_SKIPPED: &str = "skipped";

#[derive(Clone, Debug)]
pub struct Metrics {
    /// Invocations of the binary, by subcommand and outcome.
    pub cli_calls_total: IntCounterVec,
    /// Files handled by the key importer, by outcome.
    pub keys_processed_total: IntCounterVec,
    pub balance_queries_total: IntCounterVec,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Arc<Self> {
        let metrics = Self {
            cli_calls_total: register_int_counter_vec_with_registry!(
                "cli_calls_total",
                "Number of invocations of the external binary",
                &["subcommand", "outcome"],
                registry,
            )
            .unwrap(),
            keys_processed_total: register_int_counter_vec_with_registry!(
                "keys_processed_total",
                "Number of key files handled by the importer",
                &["outcome"],
                registry,
            )
            .unwrap(),
            balance_queries_total: register_int_counter_vec_with_registry!(
                "balance_queries_total",
                "Number of balance queries per shard",
                &["shard", "outcome"],
                registry,
            )
            .unwrap(),
        };
        Arc::new(metrics)
    }

    pub fn key_processed(&self, outcome: &str) {
        self.keys_processed_total.with_label_values(&[outcome]).inc();
    }

    pub fn keys_processed(&self, outcome: &str) -> u64 {
        self.keys_processed_total.with_label_values(&[outcome]).get()
    }
}
