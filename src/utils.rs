// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::time::Duration;

const UA: &str = concat!(
    "balancebook/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/balancebook)"
);

static CURRENCY_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9._-]{0,15}$").expect("currency code pattern is valid")
});

pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let c = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(UA)
        .build()?;
    Ok(c)
}

/// Ledger timestamps are fixed-width UTC so that text order is time order.
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("invalid timestamp '{s}': {e}")))
}

/// First instant of the day after `date`, the exclusive bound for "as of end of day".
pub fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| Error::InvalidInput(format!("date {date} out of range")))
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|_| Error::InvalidInput(format!("invalid decimal '{s}'")))
}

pub fn parse_opt_decimal(s: Option<String>) -> Result<Option<Decimal>> {
    s.as_deref().map(parse_decimal).transpose()
}

/// Normalise and validate a currency code ("btc " -> "BTC").
pub fn normalize_code(s: &str) -> Result<String> {
    let code = s.trim().to_uppercase();
    if !CURRENCY_CODE.is_match(&code) {
        return Err(Error::InvalidInput(format!("invalid currency code '{s}'")));
    }
    Ok(code)
}

/// Parse a duration such as "48h", "2d", "30m" or "60s".
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let invalid = || Error::InvalidInput(format!("invalid duration '{s}', use e.g. 48h, 2d, 30m"));
    let unit = s.chars().last().ok_or_else(invalid)?;
    let num: u64 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| invalid())?;
    let secs = match unit {
        'd' => num.checked_mul(24 * 60 * 60),
        'h' => num.checked_mul(60 * 60),
        'm' => num.checked_mul(60),
        's' => Some(num),
        _ => None,
    }
    .ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {}", ccy, d.round_dp(2))
}

pub fn fmt_opt(d: &Option<Decimal>) -> String {
    match d {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
