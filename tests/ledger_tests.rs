// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use balancebook::db;
use balancebook::error::Error;
use balancebook::ledger;
use balancebook::models::{AccountType, BalanceRow, CurrencyType};
use balancebook::registry;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let conn = db::open_in_memory().unwrap();
    registry::add_currency(&conn, "USD", CurrencyType::Fiat, None).unwrap();
    registry::add_currency(&conn, "BTC", CurrencyType::Crypto, None).unwrap();
    registry::add_account(&conn, "acct1", AccountType::Bank, "BCA", None).unwrap();
    registry::add_account(&conn, "Binance", AccountType::Exchange, "Binance", None).unwrap();
    conn
}

fn ts(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
}

fn row(account: &str, currency: &str, qty: Decimal, value: Option<Decimal>) -> BalanceRow {
    BalanceRow {
        account: account.into(),
        currency: currency.into(),
        quantity: qty,
        value_a: value,
        value_b: value.map(|v| v * dec!(16000)),
    }
}

fn count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM balances", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn appending_same_batch_twice_is_idempotent() {
    let mut conn = setup();
    let batch = vec![
        row("acct1", "USD", dec!(100), Some(dec!(100))),
        row("Binance", "BTC", dec!(0.5), Some(dec!(30000))),
    ];
    let first = ledger::append_batch(&mut conn, ts(1, 8), &batch, ts(1, 8)).unwrap();
    assert_eq!(first.inserted, 2);
    let before = ledger::latest_per_account_currency(&conn, None).unwrap();

    let err = ledger::append_batch(&mut conn, ts(1, 8), &batch, ts(1, 9)).unwrap_err();
    assert!(matches!(err, Error::DuplicateBatchKey { .. }));
    assert_eq!(count(&conn), 2);
    assert_eq!(ledger::latest_per_account_currency(&conn, None).unwrap(), before);
}

#[test]
fn committed_batch_cannot_gain_rows_later() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(1, 8),
        &[row("acct1", "USD", dec!(100), Some(dec!(100)))],
        ts(1, 8),
    )
    .unwrap();

    let wider = vec![
        row("acct1", "USD", dec!(100), Some(dec!(100))),
        row("Binance", "BTC", dec!(0.5), Some(dec!(30000))),
    ];
    let err = ledger::append_batch(&mut conn, ts(1, 8), &wider, ts(1, 9)).unwrap_err();
    assert!(matches!(err, Error::DuplicateBatchKey { .. }));
    assert_eq!(count(&conn), 1);

    let later = ledger::append_batch(&mut conn, ts(1, 10), &wider, ts(1, 10)).unwrap();
    assert_eq!(later.inserted, 2);
    assert_eq!(count(&conn), 3);
}

#[test]
fn ledger_rows_cannot_be_updated_or_deleted() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(1, 8),
        &[row("acct1", "USD", dec!(100), Some(dec!(100)))],
        ts(1, 8),
    )
    .unwrap();

    let upd = conn.execute("UPDATE balances SET quantity='0'", []).unwrap_err();
    assert!(matches!(Error::from(upd), Error::IntegrityViolation(_)));
    let del = conn.execute("DELETE FROM balances", []).unwrap_err();
    assert!(matches!(Error::from(del), Error::IntegrityViolation(_)));
    assert_eq!(count(&conn), 1);
}

#[test]
fn unknown_account_aborts_whole_batch() {
    let mut conn = setup();
    let err = ledger::append_batch(
        &mut conn,
        ts(1, 8),
        &[
            row("acct1", "USD", dec!(100), Some(dec!(100))),
            row("Ghost", "USD", dec!(1), Some(dec!(1))),
        ],
        ts(1, 8),
    )
    .unwrap_err();
    assert!(matches!(err, Error::IntegrityViolation(_)));
    assert_eq!(count(&conn), 0);
}

#[test]
fn latest_is_max_timestamp_even_when_inserted_out_of_order() {
    let mut conn = setup();
    ledger::append_batch(&mut conn, ts(3, 0), &[row("acct1", "USD", dec!(300), None)], ts(3, 0))
        .unwrap();
    // Late backfill of an older batch.
    ledger::append_batch(&mut conn, ts(1, 0), &[row("acct1", "USD", dec!(100), None)], ts(4, 0))
        .unwrap();
    ledger::append_batch(&mut conn, ts(2, 0), &[row("acct1", "USD", dec!(200), None)], ts(5, 0))
        .unwrap();

    let latest = ledger::latest_per_account_currency(&conn, None).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].quantity, dec!(300));
    assert_eq!(latest[0].timestamp, ts(3, 0));
    assert_eq!(latest[0].value_a, None);
}

#[test]
fn archived_accounts_are_hidden_from_latest() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(1, 0),
        &[
            row("acct1", "USD", dec!(100), Some(dec!(100))),
            row("Binance", "BTC", dec!(1), Some(dec!(60000))),
        ],
        ts(1, 0),
    )
    .unwrap();
    registry::archive_account(&conn, "Binance").unwrap();
    let latest = ledger::latest_per_account_currency(&conn, None).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].account, "acct1");
    // Still in the raw ledger.
    assert_eq!(ledger::rows(&conn, Some("Binance"), None).unwrap().len(), 1);
}

#[test]
fn append_then_zero_shows_in_latest_and_history() {
    let mut conn = setup();
    let t1 = ts(1, 8);
    let t2 = ts(2, 8);
    ledger::append_batch(&mut conn, t1, &[row("acct1", "USD", dec!(100), Some(dec!(100)))], t1)
        .unwrap();
    let latest = ledger::latest_per_account_currency(&conn, None).unwrap();
    assert_eq!(latest[0].quantity, dec!(100));
    assert_eq!(latest[0].value_a, Some(dec!(100)));

    ledger::append_batch(&mut conn, t2, &[row("acct1", "USD", dec!(0), Some(dec!(0)))], t2)
        .unwrap();
    let latest = ledger::latest_per_account_currency(&conn, None).unwrap();
    assert_eq!(latest[0].timestamp, t2);
    assert_eq!(latest[0].quantity, dec!(0));

    let history = ledger::history_by_date(&conn).unwrap();
    let dates: Vec<NaiveDate> = history.iter().map(|h| h.snapshot_date).collect();
    assert_eq!(
        dates,
        [
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
        ]
    );
    assert_eq!(history[0].net_worth_a, dec!(100));
    assert_eq!(history[1].net_worth_a, dec!(0));
}

#[test]
fn history_carries_unchanged_pairs_forward() {
    let mut conn = setup();
    ledger::append_batch(
        &mut conn,
        ts(1, 0),
        &[
            row("acct1", "USD", dec!(100), Some(dec!(100))),
            row("Binance", "BTC", dec!(1), Some(dec!(50000))),
        ],
        ts(1, 0),
    )
    .unwrap();
    ledger::append_batch(&mut conn, ts(2, 0), &[row("acct1", "USD", dec!(150), Some(dec!(150)))], ts(2, 0))
        .unwrap();
    ledger::append_batch(&mut conn, ts(2, 12), &[row("acct1", "USD", dec!(-20), Some(dec!(-20)))], ts(2, 12))
        .unwrap();

    let history = ledger::history_by_date(&conn).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].net_worth_a, dec!(50100));
    // Day 2 ends with the later batch of the day.
    assert_eq!(history[1].assets_a, dec!(50000));
    assert_eq!(history[1].liabilities_a, dec!(20));
    assert_eq!(history[1].net_worth_a, dec!(49980));
    assert_eq!(history[1].num_balances, 2);
}
