// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-only reporting projections over the latest balances and the stored
//! net-worth history. Archived accounts are never included.

use crate::error::Result;
use crate::ledger;
use crate::models::{CurrencyType, LatestBalance, NetWorthSnapshot};
use crate::networth;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated values for one group of latest balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub value_a: Decimal,
    pub value_b: Decimal,
    pub balances: usize,
    /// Balances in the group that could not be priced.
    pub unpriced: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub currency_type: CurrencyType,
    pub quantity: Decimal,
    pub value_a: Decimal,
    pub value_b: Decimal,
    pub accounts: usize,
    pub unpriced: usize,
}

/// Latest balance per `(account, currency)`. Positions that went to zero
/// are hidden unless `include_zero` is set.
pub fn latest_balances(conn: &Connection, include_zero: bool) -> Result<Vec<LatestBalance>> {
    let mut rows = ledger::latest_per_account_currency(conn, None)?;
    if !include_zero {
        rows.retain(|r| !r.quantity.is_zero());
    }
    Ok(rows)
}

pub fn totals_by_currency(conn: &Connection) -> Result<Vec<CurrencyTotal>> {
    let mut map: BTreeMap<String, CurrencyTotal> = BTreeMap::new();
    for r in latest_balances(conn, false)? {
        let t = map.entry(r.currency.clone()).or_insert_with(|| CurrencyTotal {
            currency: r.currency.clone(),
            currency_type: r.currency_type,
            quantity: Decimal::ZERO,
            value_a: Decimal::ZERO,
            value_b: Decimal::ZERO,
            accounts: 0,
            unpriced: 0,
        });
        t.quantity += r.quantity;
        t.value_a += r.value_a.unwrap_or_default();
        t.value_b += r.value_b.unwrap_or_default();
        t.accounts += 1;
        if r.value_a.is_none() {
            t.unpriced += 1;
        }
    }
    let mut out: Vec<_> = map.into_values().collect();
    out.sort_by(|a, b| b.value_a.cmp(&a.value_a).then_with(|| a.currency.cmp(&b.currency)));
    Ok(out)
}

fn group_by<F>(rows: Vec<LatestBalance>, key: F) -> Vec<GroupTotal>
where
    F: Fn(&LatestBalance) -> String,
{
    let mut map: BTreeMap<String, GroupTotal> = BTreeMap::new();
    for r in rows {
        let k = key(&r);
        let t = map.entry(k.clone()).or_insert_with(|| GroupTotal {
            key: k,
            ..GroupTotal::default()
        });
        t.value_a += r.value_a.unwrap_or_default();
        t.value_b += r.value_b.unwrap_or_default();
        t.balances += 1;
        if r.value_a.is_none() {
            t.unpriced += 1;
        }
    }
    let mut out: Vec<_> = map.into_values().collect();
    out.sort_by(|a, b| b.value_a.cmp(&a.value_a).then_with(|| a.key.cmp(&b.key)));
    out
}

pub fn totals_by_provider(conn: &Connection) -> Result<Vec<GroupTotal>> {
    Ok(group_by(latest_balances(conn, false)?, |r| r.provider.clone()))
}

pub fn totals_by_asset_class(conn: &Connection) -> Result<Vec<GroupTotal>> {
    Ok(group_by(latest_balances(conn, false)?, |r| {
        r.currency_type.as_str().to_string()
    }))
}

/// Current net worth from the latest balances, without storing a snapshot.
pub fn net_worth_summary(conn: &Connection, date: NaiveDate) -> Result<NetWorthSnapshot> {
    let latest = ledger::latest_per_account_currency(conn, None)?;
    Ok(networth::summarize(&latest, date))
}

/// Stored daily snapshots, oldest first.
pub fn daily_history(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<NetWorthSnapshot>> {
    networth::list_snapshots(conn, from, to)
}
