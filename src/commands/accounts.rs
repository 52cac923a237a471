// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::models::AccountType;
use crate::registry;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = required(sub, "name")?;
            let typ: AccountType = required(sub, "type")?.parse()?;
            let provider = required(sub, "provider")?;
            let notes = sub.get_one::<String>("notes").map(String::as_str);
            registry::add_account(conn, name, typ, provider, notes)?;
            println!("Added account '{}' ({}, {})", name.trim(), typ, provider.trim());
        }
        Some(("list", sub)) => {
            let accounts = registry::list_accounts(conn, sub.get_flag("all"))?;
            let data = accounts
                .into_iter()
                .map(|a| {
                    vec![
                        a.name,
                        a.r#type.to_string(),
                        a.provider,
                        if a.active { "active" } else { "archived" }.to_string(),
                        a.notes.unwrap_or_default(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["Name", "Type", "Provider", "Status", "Notes"], data)
            );
        }
        Some(("archive", sub)) => {
            let name = required(sub, "name")?;
            registry::archive_account(conn, name)?;
            println!("Archived account '{}'", name.trim());
        }
        _ => {}
    }
    Ok(())
}
