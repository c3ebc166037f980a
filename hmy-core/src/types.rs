// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::{Component, Path};

/// Human-chosen name of a keystore entry.
pub type Alias = String;
/// On-chain address (`one1...`) as reported by the binary. Never validated locally.
pub type Address = String;
/// Index of a shard, also the index of its endpoint in the configured list.
pub type ShardIndex = usize;

/// Suffix of the key files picked up by the importer.
pub const KEY_FILE_SUFFIX: &str = ".key";

/// Tokens callers commonly put in front of a command line even though the binary is implied.
pub const BINARY_NAME_TOKENS: [&str; 3] = ["hmy", "./hmy", "/hmy"];

/// Header tokens that must appear on the first line of `keys list`.
pub const LISTING_NAME_HEADER: &str = "NAME";
pub const LISTING_ADDRESS_HEADER: &str = "ADDRESS";

/// The alias given to the key found at `index` of a key directory listing.
pub fn alias_for_index(prefix: &str, index: usize) -> Alias {
    format!("{prefix}_{index}")
}

/// The exact message the binary prints after a successful `keys import-ks`.
/// Whether `alias` names exactly one entry directly under the keystore root.
pub fn is_keystore_entry(alias: &str) -> bool {
    let mut components = Path::new(alias).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn import_confirmation(alias: &str) -> String {
    format!("Imported keystore given account alias of `{alias}`")
}

pub fn is_import_confirmed(response: &str, alias: &str) -> bool {
    response.trim() == import_confirmation(alias)
}
