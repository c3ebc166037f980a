// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{
    error::{HarnessError, HarnessResult},
    types::ShardIndex,
};

/// Balance held on one shard, as reported by `balance`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShardBalance {
    pub shard: ShardIndex,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: f64,
}

/// The per-shard balances of one address, as seen by a single endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct BalanceReport {
    shards: Vec<ShardBalance>,
}

impl BalanceReport {
    /// Decode the textual response of `balance`: a JSON list of shard records.
    pub fn decode(response: &str) -> HarnessResult<Self> {
        serde_json::from_str(response.trim()).map_err(HarnessError::BalanceDecode)
    }

    pub fn shards(&self) -> &[ShardBalance] {
        &self.shards
    }

    pub fn shard(&self, shard: ShardIndex) -> Option<f64> {
        self.shards
            .iter()
            .find(|x| x.shard == shard)
            .map(|x| x.amount)
    }

    pub fn total(&self) -> f64 {
        self.shards.iter().map(|x| x.amount).sum()
    }
}

impl Display for BalanceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shards: Vec<_> = self
            .shards
            .iter()
            .map(|x| format!("shard {}: {}", x.shard, x.amount))
            .collect();
        write!(f, "{} (total {})", shards.join(", "), self.total())
    }
}

/// Amounts are printed either as JSON numbers or as decimal strings depending on the
/// binary's version.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(amount) => Ok(amount),
        Amount::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid amount '{text}'"))),
    }
}
