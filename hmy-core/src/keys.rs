// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::types::{Address, Alias, LISTING_ADDRESS_HEADER, LISTING_NAME_HEADER};

/// In-memory cache of the keystore's alias to address mapping. The keystore on
/// disk stays the source of truth; this is only ever refreshed from its listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<Alias, Address>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ListingError {
    MissingHeader,
    MalformedLine { line: usize, columns: usize },
}

impl std::fmt::Display for ListingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(
                f,
                "first line does not contain '{LISTING_NAME_HEADER}' and '{LISTING_ADDRESS_HEADER}'"
            ),
            Self::MalformedLine { line, columns } => {
                write!(f, "line {line} has {columns} columns instead of 2")
            }
        }
    }
}

impl AddressBook {
    /// Parse the output of `keys list`. Entries are returned in listing order,
    /// duplicates included.
    pub fn parse_listing(listing: &str) -> Result<Vec<(Alias, Address)>, ListingError> {
        let mut lines = listing.split('\n');
        let header = lines.next().unwrap_or_default();
        if !header.contains(LISTING_NAME_HEADER) || !header.contains(LISTING_ADDRESS_HEADER) {
            return Err(ListingError::MissingHeader);
        }

        let mut entries = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let columns: Vec<_> = line.split('\t').collect();
            let [name, address] = columns[..] else {
                return Err(ListingError::MalformedLine {
                    line: i + 2,
                    columns: columns.len(),
                });
            };
            entries.push((name.trim().to_string(), address.trim().to_string()));
        }
        Ok(entries)
    }

    /// Fold a parsed listing into the cache. Later entries overwrite earlier ones.
    pub fn merge<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Alias, Address)>,
    {
        self.entries.extend(entries);
    }

    pub fn get(&self, alias: &str) -> Option<&Address> {
        self.entries.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn insert(&mut self, alias: Alias, address: Address) -> Option<Address> {
        self.entries.insert(alias, address)
    }

    pub fn remove(&mut self, alias: &str) -> Option<Address> {
        self.entries.remove(alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Alias, &Address)> {
        self.entries.iter()
    }
}
