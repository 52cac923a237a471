// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::Context;
use crate::error::Error;
use crate::ledger;
use crate::rates::{self, RatePolicy};
use crate::registry::{self, Resolved};
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use std::collections::BTreeSet;

pub fn handle(ctx: &Context, conn: &Connection) -> Result<()> {
    let rows = find_issues(ctx, conn)?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn find_issues(ctx: &Context, conn: &Connection) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let now = ctx.clock.now();
    let max_age = ctx.config.max_rate_age()?;
    let policy = RatePolicy {
        reference_a: ctx.config.reference_a()?,
        reference_b: ctx.config.reference_b()?,
        max_age: Some(max_age),
        now,
    };

    // 1) Parent chains that no longer resolve
    for c in registry::list_currencies(conn)? {
        if let Err(Error::IntegrityViolation(msg)) = registry::parent_chain(conn, &c.code) {
            rows.push(vec!["broken_parent_chain".into(), msg]);
        }
    }

    // 2) Held currencies that cannot be valued right now
    let held: BTreeSet<String> = ledger::latest_per_account_currency(conn, None)?
        .into_iter()
        .filter(|b| !b.quantity.is_zero())
        .map(|b| b.currency)
        .collect();
    for code in &held {
        match registry::resolve_rate(conn, code, &policy)? {
            Resolved::Fresh(_) => {}
            Resolved::Stale(r) => rows.push(vec![
                "stale_rate_for_holding".into(),
                format!("{} (via {}, updated {})", code, r.currency, r.updated_at.format("%Y-%m-%d %H:%M")),
            ]),
            Resolved::Missing => rows.push(vec!["missing_rate_for_holding".into(), code.clone()]),
        }
    }

    // 3) Root currencies the price refresh cannot reach
    let source = ctx.config.prices.source.trim().to_lowercase();
    for c in registry::list_currencies(conn)? {
        if c.parent.is_some() || c.code == policy.reference_a {
            continue;
        }
        if let Err(Error::NotMapped { .. }) = registry::resolve_primary_symbol(conn, &c.code, &source) {
            if rates::get_rate(conn, &c.code)?.is_none() {
                rows.push(vec![
                    "no_price_mapping".into(),
                    format!("{} has no rate and no primary '{}' symbol", c.code, source),
                ]);
            }
        }
    }

    // 4) Anything stale at all
    for (r, age) in rates::stale_rates(conn, max_age, now)? {
        if !held.contains(&r.currency) {
            rows.push(vec![
                "stale_rate".into(),
                format!("{} is {}h old", r.currency, age.as_secs() / 3600),
            ]);
        }
    }
    Ok(rows)
}
