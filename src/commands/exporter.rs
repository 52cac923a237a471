// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::ledger;
use crate::models::{LatestBalance, NetWorthSnapshot};
use crate::reports;
use anyhow::{Result, bail};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let view = required(m, "view")?;
    let fmt = required(m, "format")?.to_lowercase();
    let out = required(m, "out")?;
    let n = export(conn, view, &fmt, Path::new(out))?;
    println!("Exported {} {} rows to {}", n, view, out);
    Ok(())
}

/// Write one reporting view to `out` as csv or json. Returns the row count.
pub fn export(conn: &Connection, view: &str, fmt: &str, out: &Path) -> Result<usize> {
    match view {
        "latest" => write_rows(&balance_records(reports::latest_balances(conn, true)?), fmt, out),
        "ledger" => write_rows(&balance_records(ledger::rows(conn, None, None)?), fmt, out),
        "by-currency" => write_rows(&reports::totals_by_currency(conn)?, fmt, out),
        "by-provider" => write_rows(&reports::totals_by_provider(conn)?, fmt, out),
        "by-class" => write_rows(&reports::totals_by_asset_class(conn)?, fmt, out),
        "history" => write_rows(&snapshot_records(reports::daily_history(conn, None, None)?), fmt, out),
        other => bail!("Unknown view: {} (use latest|ledger|by-currency|by-provider|by-class|history)", other),
    }
}

/// Flat csv shape. An unpriced value stays empty rather than becoming zero.
#[derive(Serialize)]
struct BalanceRecord {
    timestamp: String,
    account: String,
    account_type: String,
    provider: String,
    currency: String,
    currency_type: String,
    quantity: String,
    value_a: Option<String>,
    value_b: Option<String>,
}

fn balance_records(rows: Vec<LatestBalance>) -> Vec<BalanceRecord> {
    rows.into_iter()
        .map(|r| BalanceRecord {
            timestamp: crate::utils::fmt_ts(&r.timestamp),
            account: r.account,
            account_type: r.account_type.to_string(),
            provider: r.provider,
            currency: r.currency,
            currency_type: r.currency_type.to_string(),
            quantity: r.quantity.to_string(),
            value_a: r.value_a.map(|v| v.to_string()),
            value_b: r.value_b.map(|v| v.to_string()),
        })
        .collect()
}

#[derive(Serialize)]
struct SnapshotRecord {
    snapshot_date: String,
    assets_a: String,
    liabilities_a: String,
    net_worth_a: String,
    assets_b: String,
    liabilities_b: String,
    net_worth_b: String,
    num_balances: i64,
}

fn snapshot_records(rows: Vec<NetWorthSnapshot>) -> Vec<SnapshotRecord> {
    rows.into_iter()
        .map(|s| SnapshotRecord {
            snapshot_date: s.snapshot_date.to_string(),
            assets_a: s.assets_a.to_string(),
            liabilities_a: s.liabilities_a.to_string(),
            net_worth_a: s.net_worth_a.to_string(),
            assets_b: s.assets_b.to_string(),
            liabilities_b: s.liabilities_b.to_string(),
            net_worth_b: s.net_worth_b.to_string(),
            num_balances: s.num_balances,
        })
        .collect()
}

fn write_rows<T: Serialize>(rows: &[T], fmt: &str, out: &Path) -> Result<usize> {
    match fmt {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(rows)?)?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    Ok(rows.len())
}
