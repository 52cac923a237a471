// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use balancebook::clock::FixedClock;
use balancebook::db;
use balancebook::ledger;
use balancebook::models::{AccountType, BalanceRow, CurrencyType};
use balancebook::networth;
use balancebook::registry;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    registry::add_currency(&conn, "USD", CurrencyType::Fiat, None).unwrap();
    registry::add_currency(&conn, "BTC", CurrencyType::Crypto, None).unwrap();
    registry::add_account(&conn, "Bank", AccountType::Bank, "BCA", None).unwrap();
    registry::add_account(&conn, "Loan", AccountType::Loan, "BCA", None).unwrap();
    registry::add_account(&conn, "Binance", AccountType::Exchange, "Binance", None).unwrap();
    conn
}

fn ts(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, d, 10, 0, 0).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
}

fn row(account: &str, currency: &str, qty: Decimal, a: Option<Decimal>) -> BalanceRow {
    BalanceRow {
        account: account.into(),
        currency: currency.into(),
        quantity: qty,
        value_a: a,
        value_b: a.map(|v| v * dec!(16000)),
    }
}

fn count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM net_worth_history", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn snapshot_today_is_idempotent() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(1),
        &[
            row("Bank", "USD", dec!(1000), Some(dec!(1000))),
            row("Loan", "USD", dec!(-400), Some(dec!(-400))),
            row("Binance", "BTC", dec!(0.1), Some(dec!(6000))),
        ],
        ts(1),
    )
    .unwrap();

    let clock = FixedClock::new(ts(1));
    let first = networth::snapshot_today(&conn, &clock).unwrap().unwrap();
    let second = networth::snapshot_today(&conn, &clock).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(count(&conn), 1);

    assert_eq!(first.snapshot_date, date(1));
    assert_eq!(first.assets_a, dec!(7000));
    assert_eq!(first.liabilities_a, dec!(400));
    assert_eq!(first.net_worth_a, dec!(6600));
    assert_eq!(first.net_worth_b, dec!(105600000));
    assert_eq!(first.num_balances, 3);
    assert_eq!(networth::get_snapshot(&conn, date(1)).unwrap(), Some(first));
}

#[test]
fn snapshot_replaces_same_date_after_ledger_change() {
    let mut conn = setup();
    let clock = FixedClock::new(ts(1));
    ledger::append_batch(&mut conn, ts(1), &[row("Bank", "USD", dec!(10), Some(dec!(10)))], ts(1))
        .unwrap();
    networth::snapshot_today(&conn, &clock).unwrap();

    let later = Utc.with_ymd_and_hms(2025, 2, 1, 18, 0, 0).unwrap();
    ledger::append_batch(&mut conn, later, &[row("Bank", "USD", dec!(25), Some(dec!(25)))], later)
        .unwrap();
    let snap = networth::snapshot_today(&conn, &clock).unwrap().unwrap();
    assert_eq!(snap.net_worth_a, dec!(25));
    assert_eq!(count(&conn), 1);
}

#[test]
fn empty_ledger_is_not_snapshotted() {
    let conn = setup();
    let clock = FixedClock::new(ts(1));
    assert_eq!(networth::snapshot_today(&conn, &clock).unwrap(), None);
    assert_eq!(count(&conn), 0);
}

#[test]
fn backfill_uses_state_as_of_each_date() {
    let mut conn = setup();
    ledger::append_batch(&mut conn, ts(2), &[row("Bank", "USD", dec!(100), Some(dec!(100)))], ts(2))
        .unwrap();
    ledger::append_batch(&mut conn, ts(4), &[row("Bank", "USD", dec!(300), Some(dec!(300)))], ts(4))
        .unwrap();

    let written = networth::backfill(&conn, date(1), date(5), ts(6)).unwrap();
    let got: Vec<(NaiveDate, Decimal)> = written
        .iter()
        .map(|s| (s.snapshot_date, s.net_worth_a))
        .collect();
    assert_eq!(
        got,
        [
            (date(2), dec!(100)),
            (date(3), dec!(100)),
            (date(4), dec!(300)),
            (date(5), dec!(300)),
        ]
    );

    let stored = networth::list_snapshots(&conn, Some(date(3)), Some(date(4))).unwrap();
    assert_eq!(stored.len(), 2);

    // Re-running the backfill leaves one row per date.
    networth::backfill(&conn, date(1), date(5), ts(7)).unwrap();
    assert_eq!(count(&conn), 4);
}

#[test]
fn backfill_matches_snapshot_for_the_same_state() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(2),
        &[
            row("Bank", "USD", dec!(100), Some(dec!(100))),
            row("Binance", "BTC", dec!(1), None),
        ],
        ts(2),
    )
    .unwrap();
    let today = networth::snapshot_today(&conn, &FixedClock::new(ts(2))).unwrap().unwrap();
    let past = networth::snapshot_for_date(&conn, date(2), ts(3)).unwrap().unwrap();
    assert_eq!(today, past);
    assert_eq!(past.num_balances, 2);
    assert_eq!(past.assets_a, dec!(100));
}
