// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::registry;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let currency = required(sub, "currency")?;
            let source = required(sub, "source")?;
            let symbol = required(sub, "symbol")?;
            registry::add_mapping(
                conn,
                currency,
                source,
                symbol,
                sub.get_flag("inverted"),
                sub.get_flag("primary"),
            )?;
            println!(
                "Mapped {} to {} on {}",
                currency.trim().to_uppercase(),
                symbol.trim(),
                source.trim().to_lowercase()
            );
        }
        Some(("list", _)) => {
            let data = registry::list_mappings(conn)?
                .into_iter()
                .map(|m| {
                    vec![
                        m.currency,
                        m.source,
                        m.symbol,
                        if m.inverted { "yes" } else { "" }.to_string(),
                        if m.primary { "yes" } else { "" }.to_string(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["Currency", "Source", "Symbol", "Inverted", "Primary"], data)
            );
        }
        Some(("add-contract", sub)) => {
            let network = required(sub, "network")?;
            let address = required(sub, "address")?;
            let currency = required(sub, "currency")?;
            let decimals = sub.get_one::<u32>("decimals").copied().unwrap_or(18);
            registry::add_contract(
                conn,
                network,
                address,
                currency,
                decimals,
                sub.get_flag("native"),
            )?;
            println!(
                "Mapped {} contract {} to {}",
                network.trim().to_lowercase(),
                address.trim().to_lowercase(),
                currency.trim().to_uppercase()
            );
        }
        _ => {}
    }
    Ok(())
}
