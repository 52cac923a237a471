// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Daily net-worth snapshots, one row per calendar date.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ledger;
use crate::models::{LatestBalance, NetWorthSnapshot};
use crate::utils::{end_of_day, fmt_ts, parse_date, parse_decimal};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Split balances into assets (quantity >= 0) and liabilities (quantity < 0)
/// and total both reference valuations. Unpriced rows count towards
/// `num_balances` but contribute nothing to the sums.
pub fn summarize<'a, I>(rows: I, date: NaiveDate) -> NetWorthSnapshot
where
    I: IntoIterator<Item = &'a LatestBalance>,
{
    let mut assets_a = Decimal::ZERO;
    let mut assets_b = Decimal::ZERO;
    let mut liabilities_a = Decimal::ZERO;
    let mut liabilities_b = Decimal::ZERO;
    let mut n = 0i64;
    for r in rows {
        n += 1;
        let va = r.value_a.unwrap_or_default();
        let vb = r.value_b.unwrap_or_default();
        if r.quantity.is_sign_negative() && !r.quantity.is_zero() {
            liabilities_a += va.abs();
            liabilities_b += vb.abs();
        } else {
            assets_a += va;
            assets_b += vb;
        }
    }
    NetWorthSnapshot {
        snapshot_date: date,
        assets_a,
        liabilities_a,
        net_worth_a: assets_a - liabilities_a,
        assets_b,
        liabilities_b,
        net_worth_b: assets_b - liabilities_b,
        num_balances: n,
    }
}

/// Insert or replace the row for `snap.snapshot_date`.
pub fn upsert(conn: &Connection, snap: &NetWorthSnapshot, updated_at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO net_worth_history(
             snapshot_date, assets_a, liabilities_a, net_worth_a,
             assets_b, liabilities_b, net_worth_b, num_balances, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(snapshot_date) DO UPDATE SET
             assets_a=excluded.assets_a,
             liabilities_a=excluded.liabilities_a,
             net_worth_a=excluded.net_worth_a,
             assets_b=excluded.assets_b,
             liabilities_b=excluded.liabilities_b,
             net_worth_b=excluded.net_worth_b,
             num_balances=excluded.num_balances,
             updated_at=excluded.updated_at",
        params![
            snap.snapshot_date.to_string(),
            snap.assets_a.to_string(),
            snap.liabilities_a.to_string(),
            snap.net_worth_a.to_string(),
            snap.assets_b.to_string(),
            snap.liabilities_b.to_string(),
            snap.net_worth_b.to_string(),
            snap.num_balances,
            fmt_ts(&updated_at)
        ],
    )?;
    Ok(())
}

/// Snapshot the current latest balances under today's date. Returns `None`
/// without writing when the ledger holds no balances yet.
pub fn snapshot_today(conn: &Connection, clock: &dyn Clock) -> Result<Option<NetWorthSnapshot>> {
    let today = clock.today();
    let latest = ledger::latest_per_account_currency(conn, None)?;
    if latest.is_empty() {
        warn!(date = %today, "no balances recorded; snapshot skipped");
        return Ok(None);
    }
    let snap = summarize(&latest, today);
    upsert(conn, &snap, clock.now())?;
    info!(
        date = %today,
        net_worth_a = %snap.net_worth_a,
        net_worth_b = %snap.net_worth_b,
        balances = snap.num_balances,
        "net worth snapshot saved"
    );
    Ok(Some(snap))
}

/// Snapshot a past date from the ledger state as of the end of that date.
pub fn snapshot_for_date(
    conn: &Connection,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Option<NetWorthSnapshot>> {
    let latest = ledger::latest_per_account_currency(conn, Some(end_of_day(date)?))?;
    if latest.is_empty() {
        return Ok(None);
    }
    let snap = summarize(&latest, date);
    upsert(conn, &snap, now)?;
    Ok(Some(snap))
}

/// Snapshot every date in `from..=to`. Dates before the first batch are
/// skipped.
pub fn backfill(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<NetWorthSnapshot>> {
    if from > to {
        return Err(Error::InvalidInput(format!(
            "backfill range is empty: {from} is after {to}"
        )));
    }
    let mut out = Vec::new();
    for date in from.iter_days().take_while(|d| *d <= to) {
        if let Some(snap) = snapshot_for_date(conn, date, now)? {
            out.push(snap);
        }
    }
    info!(%from, %to, written = out.len(), "backfill finished");
    Ok(out)
}

fn snapshot_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<[String; 7]> {
    Ok([
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
    ])
}

fn to_snapshot(cols: [String; 7], num_balances: i64) -> Result<NetWorthSnapshot> {
    let [date, aa, la, na, ab, lb, nb] = cols;
    Ok(NetWorthSnapshot {
        snapshot_date: parse_date(&date)?,
        assets_a: parse_decimal(&aa)?,
        liabilities_a: parse_decimal(&la)?,
        net_worth_a: parse_decimal(&na)?,
        assets_b: parse_decimal(&ab)?,
        liabilities_b: parse_decimal(&lb)?,
        net_worth_b: parse_decimal(&nb)?,
        num_balances,
    })
}

const SNAPSHOT_SELECT: &str = "SELECT snapshot_date, assets_a, liabilities_a, net_worth_a,
            assets_b, liabilities_b, net_worth_b, num_balances
     FROM net_worth_history";

pub fn get_snapshot(conn: &Connection, date: NaiveDate) -> Result<Option<NetWorthSnapshot>> {
    let row = conn
        .query_row(
            &format!("{SNAPSHOT_SELECT} WHERE snapshot_date=?1"),
            [date.to_string()],
            |r| Ok((snapshot_from_row(r)?, r.get::<_, i64>(7)?)),
        )
        .optional()?;
    row.map(|(cols, n)| to_snapshot(cols, n)).transpose()
}

/// Stored snapshots in date order, optionally bounded on either side.
pub fn list_snapshots(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<NetWorthSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "{SNAPSHOT_SELECT}
         WHERE (?1 IS NULL OR snapshot_date >= ?1) AND (?2 IS NULL OR snapshot_date <= ?2)
         ORDER BY snapshot_date"
    ))?;
    let rows = stmt.query_map(
        params![from.map(|d| d.to_string()), to.map(|d| d.to_string())],
        |r| Ok((snapshot_from_row(r)?, r.get::<_, i64>(7)?)),
    )?;
    let mut out = Vec::new();
    for row in rows {
        let (cols, n) = row?;
        out.push(to_snapshot(cols, n)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, CurrencyType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bal(qty: Decimal, a: Option<Decimal>, b: Option<Decimal>) -> LatestBalance {
        LatestBalance {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            account: "x".into(),
            account_type: AccountType::Bank,
            provider: "p".into(),
            currency: "USD".into(),
            currency_type: CurrencyType::Fiat,
            quantity: qty,
            value_a: a,
            value_b: b,
        }
    }

    #[test]
    fn summarize_splits_assets_and_liabilities() {
        let rows = vec![
            bal(dec!(100), Some(dec!(100)), Some(dec!(1600000))),
            bal(dec!(-40), Some(dec!(-40)), Some(dec!(-640000))),
            bal(dec!(0), Some(dec!(0)), Some(dec!(0))),
            bal(dec!(3), None, None),
        ];
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let s = summarize(&rows, d);
        assert_eq!(s.assets_a, dec!(100));
        assert_eq!(s.liabilities_a, dec!(40));
        assert_eq!(s.net_worth_a, dec!(60));
        assert_eq!(s.liabilities_b, dec!(640000));
        assert_eq!(s.net_worth_b, dec!(960000));
        assert_eq!(s.num_balances, 4);
    }

    #[test]
    fn backfill_rejects_reversed_range() {
        let conn = crate::db::open_in_memory().unwrap();
        let a = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            backfill(&conn, a, b, Utc::now()),
            Err(Error::InvalidInput(_))
        ));
    }
}
