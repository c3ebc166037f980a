// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use hmy_core::{
    balance::BalanceReport,
    importer::ImportReport,
    types::{Address, Alias},
};
use prettytable::{format, row, Cell, Row, Table};

fn table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table
}

/// One row per alias with a column per shard seen in the reports.
pub fn funds_table(report: &ImportReport) -> Table {
    let shards: BTreeSet<_> = report
        .balances
        .values()
        .flat_map(|x| x.shards().iter().map(|s| s.shard))
        .collect();

    let mut table = table();
    let mut titles = vec![Cell::new("Alias")];
    titles.extend(shards.iter().map(|s| Cell::new(&format!("Shard {s}"))));
    titles.push(Cell::new("Total"));
    table.set_titles(Row::new(titles));

    for (alias, balance) in &report.balances {
        let mut cells = vec![Cell::new(alias)];
        cells.extend(shards.iter().map(|s| {
            let amount = balance.shard(*s).map(|x| x.to_string());
            Cell::new(amount.as_deref().unwrap_or("-"))
        }));
        cells.push(Cell::new(&balance.total().to_string()));
        table.add_row(Row::new(cells));
    }
    table
}

pub fn summary_table(report: &ImportReport) -> Table {
    let mut table = table();
    table.set_titles(row![b->"Keys", b->"Count"]);
    table.add_row(row!["Imported", report.imported.len()]);
    table.add_row(row!["Already loaded", report.existing.len()]);
    table.add_row(row!["Failed", report.failed.len()]);
    table.add_row(row!["With balance", report.balances.len()]);
    table
}

pub fn failures_table(report: &ImportReport) -> Table {
    let mut table = table();
    table.set_titles(row![b->"Alias", b->"Reason"]);
    for (alias, reason) in &report.failed {
        table.add_row(row![alias, reason]);
    }
    table
}

pub fn aliases_table(aliases: &[(Alias, Address)]) -> Table {
    let mut table = table();
    table.set_titles(row![b->"Name", b->"Address"]);
    for (alias, address) in aliases {
        table.add_row(row![alias, address]);
    }
    table
}

pub fn balance_table(alias: &str, balance: &BalanceReport) -> Table {
    let mut table = table();
    table.set_titles(row![b->format!("Shard ({alias})"), b->"Amount"]);
    for shard in balance.shards() {
        table.add_row(row![shard.shard, shard.amount]);
    }
    table.add_row(row![b->"Total", balance.total()]);
    table
}
