// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::Context;
use super::snapshot::print_snapshots;
use crate::ledger;
use crate::reports::{self, GroupTotal};
use crate::utils::{fmt_opt, maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(ctx: &Context, conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("latest", sub)) => latest(conn, sub)?,
        Some(("by-currency", sub)) => by_currency(conn, sub)?,
        Some(("by-provider", sub)) => {
            groups(ctx, "Provider", reports::totals_by_provider(conn)?, sub)?
        }
        Some(("by-class", sub)) => {
            groups(ctx, "Class", reports::totals_by_asset_class(conn)?, sub)?
        }
        Some(("summary", sub)) => {
            let s = reports::net_worth_summary(conn, ctx.clock.today())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
                print_snapshots(ctx, &[s])?;
            }
        }
        Some(("history", sub)) => {
            let from = sub.get_one::<String>("from").map(|d| parse_date(d)).transpose()?;
            let to = sub.get_one::<String>("to").map(|d| parse_date(d)).transpose()?;
            let snaps = reports::daily_history(conn, from, to)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &snaps)? {
                print_snapshots(ctx, &snaps)?;
            }
        }
        Some(("ledger-history", sub)) => {
            let days = ledger::history_by_date(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &days)? {
                print_snapshots(ctx, &days)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn latest(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rows = reports::latest_balances(conn, sub.get_flag("zero"))?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        return Ok(());
    }
    let data = rows
        .into_iter()
        .map(|r| {
            vec![
                r.account,
                r.provider,
                r.currency,
                r.quantity.normalize().to_string(),
                fmt_opt(&r.value_a),
                fmt_opt(&r.value_b),
                r.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Account", "Provider", "Currency", "Quantity", "Value", "Value (2nd)", "As Of"],
            data
        )
    );
    Ok(())
}

fn by_currency(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let rows = reports::totals_by_currency(conn)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        return Ok(());
    }
    let data = rows
        .into_iter()
        .map(|t| {
            vec![
                t.currency,
                t.currency_type.to_string(),
                t.quantity.normalize().to_string(),
                format!("{:.2}", t.value_a),
                format!("{:.2}", t.value_b),
                t.accounts.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Currency", "Type", "Quantity", "Value", "Value (2nd)", "Accounts"],
            data
        )
    );
    Ok(())
}

fn groups(
    ctx: &Context,
    label: &str,
    rows: Vec<GroupTotal>,
    sub: &clap::ArgMatches,
) -> Result<()> {
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rows)? {
        return Ok(());
    }
    let a = ctx.config.reference_a()?;
    let b = ctx.config.reference_b()?;
    let data = rows
        .into_iter()
        .map(|g| {
            vec![
                g.key,
                format!("{:.2}", g.value_a),
                format!("{:.2}", g.value_b),
                g.balances.to_string(),
                g.unpriced.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&[label, a.as_str(), b.as_str(), "Balances", "Unpriced"], data)
    );
    Ok(())
}
