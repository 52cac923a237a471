// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The append-only balance ledger.
//!
//! `append_batch` is the only writer. Everything else here is a read
//! projection over `balances` joined with reference data.

use crate::error::{Error, Result};
use crate::models::{BalanceRow, LatestBalance, NetWorthSnapshot};
use crate::networth;
use crate::registry;
use crate::utils::{fmt_ts, parse_decimal, parse_opt_decimal, parse_ts};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    pub inserted: usize,
}

/// Append every row under `batch_ts` in one transaction.
///
/// A batch is committed once. If any row already exists under `batch_ts`,
/// [`Error::DuplicateBatchKey`] is returned with nothing written, so a
/// committed batch never gains rows later. Unknown accounts or currencies
/// abort the whole batch.
pub fn append_batch(
    conn: &mut Connection,
    batch_ts: DateTime<Utc>,
    rows: &[BalanceRow],
    created_at: DateTime<Utc>,
) -> Result<AppendOutcome> {
    let accounts = registry::account_ids(conn)?;
    let currencies = registry::currency_ids(conn)?;
    let mut keyed = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();
    for row in rows {
        let account_id = *accounts.get(&row.account).ok_or_else(|| {
            Error::IntegrityViolation(format!("unknown account '{}'", row.account))
        })?;
        let currency_id = *currencies.get(&row.currency).ok_or_else(|| {
            Error::IntegrityViolation(format!("unknown currency '{}'", row.currency))
        })?;
        if !seen.insert((account_id, currency_id)) {
            return Err(Error::IntegrityViolation(format!(
                "{}/{} appears twice in one batch",
                row.account, row.currency
            )));
        }
        keyed.push((account_id, currency_id, row));
    }

    let ts = fmt_ts(&batch_ts);
    let created = fmt_ts(&created_at);
    let tx = conn.transaction()?;
    let existing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM balances WHERE timestamp=?1",
        [&ts],
        |r| r.get(0),
    )?;
    if existing > 0 {
        warn!(batch = %ts, existing, "batch already recorded; nothing appended");
        tx.rollback()?;
        return Err(Error::DuplicateBatchKey { timestamp: ts });
    }
    let mut outcome = AppendOutcome::default();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO balances(timestamp, account_id, currency_id, quantity, value_a, value_b, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (account_id, currency_id, row) in &keyed {
            outcome.inserted += stmt.execute(params![
                ts,
                account_id,
                currency_id,
                row.quantity.to_string(),
                row.value_a.map(|v| v.to_string()),
                row.value_b.map(|v| v.to_string()),
                created
            ])?;
        }
    }
    tx.commit()?;
    debug!(batch = %ts, inserted = outcome.inserted, "batch appended");
    Ok(outcome)
}

const JOINED_COLUMNS: &str = "b.timestamp, a.name, a.type, p.name, c.code, c.type,
     b.quantity, b.value_a, b.value_b";

const JOINED_FROM: &str = "FROM balances b
     JOIN accounts a ON b.account_id = a.id
     JOIN providers p ON a.provider_id = p.id
     JOIN currencies c ON b.currency_id = c.id";

type RawRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

fn raw_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
    ))
}

fn to_balance(raw: RawRow) -> Result<LatestBalance> {
    let (ts, account, atype, provider, currency, ctype, qty, va, vb) = raw;
    Ok(LatestBalance {
        timestamp: parse_ts(&ts)?,
        account,
        account_type: atype.parse()?,
        provider,
        currency,
        currency_type: ctype.parse()?,
        quantity: parse_decimal(&qty)?,
        value_a: parse_opt_decimal(va)?,
        value_b: parse_opt_decimal(vb)?,
    })
}

/// For each `(account, currency)` of an active account, the row with the
/// greatest timestamp. With `as_of`, only rows strictly before that instant
/// are considered.
pub fn latest_per_account_currency(
    conn: &Connection,
    as_of: Option<DateTime<Utc>>,
) -> Result<Vec<LatestBalance>> {
    let sql = format!(
        "SELECT * FROM (
             SELECT {JOINED_COLUMNS},
                    ROW_NUMBER() OVER (
                        PARTITION BY b.account_id, b.currency_id
                        ORDER BY b.timestamp DESC, b.id DESC
                    ) AS rn
             {JOINED_FROM}
             WHERE a.is_active = 1 AND (?1 IS NULL OR b.timestamp < ?1)
         ) WHERE rn = 1
         ORDER BY 2, 5"
    );
    let mut stmt = conn.prepare(&sql)?;
    let bound = as_of.map(|t| fmt_ts(&t));
    let rows = stmt.query_map([bound], raw_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(to_balance(row?)?);
    }
    Ok(out)
}

/// Net-worth totals for every calendar date (UTC) that has at least one
/// batch, each computed from the latest balances as of the end of that date.
///
/// One ordered pass over the ledger, so cost grows with the number of rows
/// rather than rows times days.
pub fn history_by_date(conn: &Connection) -> Result<Vec<NetWorthSnapshot>> {
    let sql = format!(
        "SELECT {JOINED_COLUMNS} {JOINED_FROM}
         WHERE a.is_active = 1
         ORDER BY b.timestamp, b.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], raw_row)?;

    let mut state: HashMap<(String, String), LatestBalance> = HashMap::new();
    let mut day: Option<NaiveDate> = None;
    let mut out = Vec::new();
    for row in rows {
        let bal = to_balance(row?)?;
        let date = bal.timestamp.date_naive();
        if let Some(prev) = day {
            if prev != date {
                out.push(networth::summarize(state.values(), prev));
            }
        }
        day = Some(date);
        state.insert((bal.account.clone(), bal.currency.clone()), bal);
    }
    if let Some(last) = day {
        out.push(networth::summarize(state.values(), last));
    }
    Ok(out)
}

/// Every recorded row, oldest first, optionally narrowed to one account
/// and/or currency. Archived accounts are included.
pub fn rows(
    conn: &Connection,
    account: Option<&str>,
    currency: Option<&str>,
) -> Result<Vec<LatestBalance>> {
    let sql = format!(
        "SELECT {JOINED_COLUMNS} {JOINED_FROM}
         WHERE (?1 IS NULL OR a.name = ?1) AND (?2 IS NULL OR c.code = ?2)
         ORDER BY b.timestamp, a.name, c.code"
    );
    let currency = currency.map(|c| c.trim().to_uppercase());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account.map(str::trim), currency], raw_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(to_balance(row?)?);
    }
    Ok(out)
}

/// Distinct batch timestamps, oldest first.
pub fn batch_timestamps(conn: &Connection) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare("SELECT DISTINCT timestamp FROM balances ORDER BY timestamp")?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(parse_ts(&row?)?);
    }
    Ok(out)
}
