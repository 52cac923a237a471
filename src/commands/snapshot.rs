// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{Context, required};
use crate::lock::RunLock;
use crate::models::NetWorthSnapshot;
use crate::networth;
use crate::utils::{fmt_money, parse_date, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn snapshot(ctx: &Context, conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let _lock = RunLock::acquire(&RunLock::path_for(&ctx.db_path, "snapshot"))?;
    let saved = match m.get_one::<String>("date") {
        Some(d) => networth::snapshot_for_date(conn, parse_date(d)?, ctx.clock.now())?,
        None => networth::snapshot_today(conn, ctx.clock.as_ref())?,
    };
    match saved {
        Some(s) => print_snapshots(ctx, &[s])?,
        None => println!("No balances recorded; nothing to snapshot"),
    }
    Ok(())
}

pub fn backfill(ctx: &Context, conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let _lock = RunLock::acquire(&RunLock::path_for(&ctx.db_path, "snapshot"))?;
    let from = parse_date(required(m, "from")?)?;
    let to = parse_date(required(m, "to")?)?;
    let written = networth::backfill(conn, from, to, ctx.clock.now())?;
    println!("Saved {} snapshots between {} and {}", written.len(), from, to);
    Ok(())
}

pub(crate) fn print_snapshots(ctx: &Context, snaps: &[NetWorthSnapshot]) -> Result<()> {
    let (a, b) = (ctx.config.reference_a()?, ctx.config.reference_b()?);
    let data = snaps
        .iter()
        .map(|s| {
            vec![
                s.snapshot_date.to_string(),
                fmt_money(&s.assets_a, &a),
                fmt_money(&s.liabilities_a, &a),
                fmt_money(&s.net_worth_a, &a),
                fmt_money(&s.net_worth_b, &b),
                s.num_balances.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Date", "Assets", "Liabilities", "Net Worth", "Net Worth (2nd)", "Balances"],
            data
        )
    );
    Ok(())
}
