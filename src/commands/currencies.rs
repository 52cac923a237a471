// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::models::CurrencyType;
use crate::registry;
use crate::utils::{normalize_code, pretty_table};
use anyhow::{Context as _, Result};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let code = normalize_code(required(sub, "code")?)?;
            let typ: CurrencyType = required(sub, "type")?.parse()?;
            let name = sub.get_one::<String>("name").map(String::as_str);
            registry::add_currency(conn, &code, typ, name)
                .with_context(|| format!("Add currency {code}"))?;
            if let Some(parent) = sub.get_one::<String>("parent") {
                registry::set_parent(conn, &code, Some(parent))?;
            }
            println!("Added currency {} ({})", code, typ);
        }
        Some(("list", _)) => {
            let data = registry::list_currencies(conn)?
                .into_iter()
                .map(|c| {
                    vec![
                        c.code,
                        c.r#type.to_string(),
                        c.name.unwrap_or_default(),
                        c.parent.unwrap_or_default(),
                    ]
                })
                .collect();
            println!("{}", pretty_table(&["Code", "Type", "Name", "Parent"], data));
        }
        Some(("set-parent", sub)) => {
            let code = required(sub, "code")?;
            let parent = sub.get_one::<String>("parent").map(String::as_str);
            registry::set_parent(conn, code, parent)?;
            match parent {
                Some(p) => println!(
                    "{} now inherits the rate of {}",
                    code.trim().to_uppercase(),
                    p.trim().to_uppercase()
                ),
                None => println!("{} has no parent", code.trim().to_uppercase()),
            }
        }
        _ => {}
    }
    Ok(())
}
