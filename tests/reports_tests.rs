// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use balancebook::db;
use balancebook::ledger;
use balancebook::models::{AccountType, BalanceRow, CurrencyType};
use balancebook::registry;
use balancebook::reports;
use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn row(account: &str, currency: &str, qty: Decimal, a: Option<Decimal>) -> BalanceRow {
    BalanceRow {
        account: account.into(),
        currency: currency.into(),
        quantity: qty,
        value_a: a,
        value_b: a,
    }
}

fn setup() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    registry::add_currency(&conn, "USD", CurrencyType::Fiat, None).unwrap();
    registry::add_currency(&conn, "BTC", CurrencyType::Crypto, None).unwrap();
    registry::add_currency(&conn, "USDT", CurrencyType::Stablecoin, None).unwrap();
    registry::add_currency(&conn, "XAU", CurrencyType::Metal, None).unwrap();
    registry::add_account(&conn, "Binance Spot", AccountType::Exchange, "Binance", None).unwrap();
    registry::add_account(&conn, "Binance Earn", AccountType::Exchange, "Binance", None).unwrap();
    registry::add_account(&conn, "BCA", AccountType::Bank, "BCA", None).unwrap();
    registry::add_account(&conn, "Old", AccountType::Bank, "Closed Bank", None).unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
    ledger::append_batch(
        &mut conn,
        t1,
        &[
            row("Binance Spot", "BTC", dec!(0.5), Some(dec!(30000))),
            row("Binance Earn", "USDT", dec!(1000), Some(dec!(1000))),
            row("Old", "USD", dec!(50), Some(dec!(50))),
            row("BCA", "XAU", dec!(2), None),
        ],
        t1,
    )
    .unwrap();
    ledger::append_batch(
        &mut conn,
        t2,
        &[
            row("Binance Earn", "BTC", dec!(0.25), Some(dec!(15000))),
            row("BCA", "USD", dec!(500), Some(dec!(500))),
            row("Binance Earn", "USDT", dec!(0), Some(dec!(0))),
        ],
        t2,
    )
    .unwrap();
    registry::archive_account(&conn, "Old").unwrap();
    conn
}

#[test]
fn latest_hides_zero_and_archived() {
    let conn = setup();
    let rows = reports::latest_balances(&conn, false).unwrap();
    let pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.account.as_str(), r.currency.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("BCA", "USD"),
            ("BCA", "XAU"),
            ("Binance Earn", "BTC"),
            ("Binance Spot", "BTC")
        ]
    );
    assert_eq!(reports::latest_balances(&conn, true).unwrap().len(), 5);
}

#[test]
fn totals_by_currency_sum_across_accounts() {
    let conn = setup();
    let totals = reports::totals_by_currency(&conn).unwrap();
    assert_eq!(totals[0].currency, "BTC");
    assert_eq!(totals[0].quantity, dec!(0.75));
    assert_eq!(totals[0].value_a, dec!(45000));
    assert_eq!(totals[0].accounts, 2);
    let xau = totals.iter().find(|t| t.currency == "XAU").unwrap();
    assert_eq!(xau.unpriced, 1);
    assert_eq!(xau.value_a, dec!(0));
}

#[test]
fn totals_by_provider_and_class() {
    let conn = setup();
    let providers = reports::totals_by_provider(&conn).unwrap();
    let keys: Vec<&str> = providers.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, ["Binance", "BCA"]);
    assert_eq!(providers[0].value_a, dec!(45000));
    assert_eq!(providers[1].balances, 2);
    assert_eq!(providers[1].unpriced, 1);

    let classes = reports::totals_by_asset_class(&conn).unwrap();
    let keys: Vec<&str> = classes.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, ["crypto", "fiat", "metal"]);
}

#[test]
fn summary_and_history() {
    let conn = setup();
    let d = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
    let s = reports::net_worth_summary(&conn, d).unwrap();
    assert_eq!(s.net_worth_a, dec!(45500));
    assert_eq!(s.num_balances, 5);

    assert!(reports::daily_history(&conn, None, None).unwrap().is_empty());
    balancebook::networth::snapshot_for_date(&conn, d, Utc::now()).unwrap();
    let h = reports::daily_history(&conn, None, None).unwrap();
    assert_eq!(h.len(), 1);
    assert_eq!(h[0].net_worth_a, dec!(45500));
}
