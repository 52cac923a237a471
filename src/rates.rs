// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Latest-rate store and valuation.
//!
//! One row per currency, overwritten in place. Historical rates live on only
//! inside already-valued ledger rows.

use crate::error::{Error, Result};
use crate::models::Rate;
use crate::registry::{self, Resolved};
use crate::utils::{fmt_ts, normalize_code, parse_decimal, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// How rates are interpreted for one valuation pass.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    pub reference_a: String,
    pub reference_b: String,
    /// `None` disables the staleness check.
    pub max_age: Option<Duration>,
    pub now: DateTime<Utc>,
}

impl RatePolicy {
    pub fn age(&self, rate: &Rate) -> Duration {
        (self.now - rate.updated_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_stale(&self, rate: &Rate) -> bool {
        match self.max_age {
            Some(max) => self.age(rate) > max,
            None => false,
        }
    }
}

pub fn set_rate(
    conn: &Connection,
    currency: &str,
    rate: Decimal,
    source: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if rate <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "rate for {} must be positive, got {}",
            currency.trim().to_uppercase(),
            rate
        )));
    }
    let id = registry::currency_id(conn, currency)?;
    conn.execute(
        "INSERT INTO rates(currency_id, rate, source, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(currency_id) DO UPDATE SET
             rate=excluded.rate, source=excluded.source, updated_at=excluded.updated_at",
        params![id, rate.to_string(), source, fmt_ts(&now)],
    )?;
    debug!(currency = %currency, %rate, %source, "rate set");
    Ok(())
}

fn rate_from_parts(code: String, rate: String, source: String, updated_at: String) -> Result<Rate> {
    Ok(Rate {
        rate: parse_decimal(&rate)?,
        updated_at: parse_ts(&updated_at)?,
        currency: code,
        source,
    })
}

pub fn get_rate(conn: &Connection, currency: &str) -> Result<Option<Rate>> {
    let code = normalize_code(currency)?;
    let row = conn
        .query_row(
            "SELECT c.code, r.rate, r.source, r.updated_at
             FROM rates r JOIN currencies c ON r.currency_id = c.id WHERE c.code=?1",
            [&code],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    row.map(|(c, r, s, u)| rate_from_parts(c, r, s, u)).transpose()
}

pub fn list_rates(conn: &Connection) -> Result<Vec<Rate>> {
    let mut stmt = conn.prepare(
        "SELECT c.code, r.rate, r.source, r.updated_at
         FROM rates r JOIN currencies c ON r.currency_id = c.id ORDER BY c.code",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (c, r, s, u) = row?;
        out.push(rate_from_parts(c, r, s, u)?);
    }
    Ok(out)
}

/// A currency with no stored rate counts as stale.
pub fn is_stale(
    conn: &Connection,
    currency: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    Ok(match get_rate(conn, currency)? {
        Some(rate) => (now - rate.updated_at).to_std().unwrap_or(Duration::ZERO) > max_age,
        None => true,
    })
}

/// Stored rates older than `max_age`, oldest first, with their age.
pub fn stale_rates(
    conn: &Connection,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<(Rate, Duration)>> {
    let mut out: Vec<(Rate, Duration)> = list_rates(conn)?
        .into_iter()
        .map(|r| {
            let age = (now - r.updated_at).to_std().unwrap_or(Duration::ZERO);
            (r, age)
        })
        .filter(|(_, age)| *age > max_age)
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(out)
}

/// Reference-currency values for one quantity. `None` means "could not be
/// priced", which is different from a zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub value_a: Option<Decimal>,
    pub value_b: Option<Decimal>,
    /// Why `value_a` is missing, if it is.
    pub unresolved: Option<String>,
}

/// Values quantities in both reference currencies, caching resolved rates
/// for the duration of one batch.
pub struct Valuer<'c> {
    conn: &'c Connection,
    policy: RatePolicy,
    rate_b: Option<Decimal>,
    cache: HashMap<String, Resolved>,
}

impl<'c> Valuer<'c> {
    pub fn new(conn: &'c Connection, policy: RatePolicy) -> Result<Self> {
        let mut valuer = Self {
            conn,
            rate_b: None,
            cache: HashMap::new(),
            policy,
        };
        if valuer.policy.reference_b == valuer.policy.reference_a {
            valuer.rate_b = Some(Decimal::ONE);
        } else {
            let code = valuer.policy.reference_b.clone();
            match valuer.resolve(&code) {
                Ok(Resolved::Fresh(r)) => valuer.rate_b = Some(r.rate),
                Ok(other) => warn!(
                    currency = %code,
                    resolved = ?other,
                    "second reference currency has no usable rate; its values will be empty"
                ),
                Err(Error::NotFound { .. }) => warn!(
                    currency = %code,
                    "second reference currency is not registered; its values will be empty"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(valuer)
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn resolve(&mut self, code: &str) -> Result<Resolved> {
        if let Some(r) = self.cache.get(code) {
            return Ok(r.clone());
        }
        let resolved = registry::resolve_rate(self.conn, code, &self.policy)?;
        self.cache.insert(code.to_string(), resolved.clone());
        Ok(resolved)
    }

    pub fn value(&mut self, code: &str, quantity: Decimal) -> Result<Valuation> {
        let resolved = self.resolve(code)?;
        let unresolved = |reason: String| Valuation {
            value_a: None,
            value_b: None,
            unresolved: Some(reason),
        };
        let rate = match resolved {
            Resolved::Fresh(r) => r.rate,
            Resolved::Stale(r) => {
                let age = self.policy.age(&r);
                return Ok(unresolved(format!(
                    "rate of {} is stale ({}h old)",
                    r.currency,
                    age.as_secs() / 3600
                )));
            }
            Resolved::Missing => return Ok(unresolved("no rate recorded".to_string())),
        };
        let Some(value_a) = quantity.checked_mul(rate) else {
            return Ok(unresolved(format!("{quantity} x {rate} overflows")));
        };
        let value_b = self.rate_b.and_then(|rb| value_a.checked_div(rb));
        Ok(Valuation {
            value_a: Some(value_a),
            value_b,
            unresolved: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::CurrencyType;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn setup() -> (Connection, DateTime<Utc>) {
        let conn = db::open_in_memory().unwrap();
        registry::add_currency(&conn, "USD", CurrencyType::Fiat, None).unwrap();
        registry::add_currency(&conn, "IDR", CurrencyType::Fiat, None).unwrap();
        registry::add_currency(&conn, "BTC", CurrencyType::Crypto, None).unwrap();
        (conn, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
    }

    fn policy(now: DateTime<Utc>) -> RatePolicy {
        RatePolicy {
            reference_a: "USD".into(),
            reference_b: "IDR".into(),
            max_age: Some(Duration::from_secs(48 * 3600)),
            now,
        }
    }

    #[test]
    fn set_rate_overwrites_and_rejects_non_positive() {
        let (conn, now) = setup();
        set_rate(&conn, "btc", dec!(60000), "manual", now).unwrap();
        set_rate(&conn, "BTC", dec!(61000), "yahoo", now).unwrap();
        let r = get_rate(&conn, "BTC").unwrap().unwrap();
        assert_eq!(r.rate, dec!(61000));
        assert_eq!(r.source, "yahoo");
        assert_eq!(list_rates(&conn).unwrap().len(), 1);

        assert!(matches!(
            set_rate(&conn, "BTC", Decimal::ZERO, "manual", now),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            set_rate(&conn, "XYZ", dec!(1), "manual", now),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn staleness_counts_missing_rates() {
        let (conn, now) = setup();
        let old = now - chrono::Duration::hours(72);
        set_rate(&conn, "IDR", dec!(0.00006), "manual", old).unwrap();
        set_rate(&conn, "BTC", dec!(60000), "manual", now).unwrap();
        let max = Duration::from_secs(48 * 3600);
        assert!(is_stale(&conn, "IDR", max, now).unwrap());
        assert!(!is_stale(&conn, "BTC", max, now).unwrap());
        assert!(is_stale(&conn, "USD", max, now).unwrap());

        let stale = stale_rates(&conn, max, now).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0.currency, "IDR");
        assert_eq!(stale[0].1, Duration::from_secs(72 * 3600));
    }

    #[test]
    fn valuer_converts_through_reference_b() {
        let (conn, now) = setup();
        set_rate(&conn, "IDR", dec!(0.0000625), "manual", now).unwrap();
        set_rate(&conn, "BTC", dec!(60000), "manual", now).unwrap();
        let mut v = Valuer::new(&conn, policy(now)).unwrap();

        let btc = v.value("BTC", dec!(0.5)).unwrap();
        assert_eq!(btc.value_a, Some(dec!(30000)));
        assert_eq!(btc.value_b, Some(dec!(480000000)));
        assert!(btc.unresolved.is_none());

        let usd = v.value("USD", dec!(-100)).unwrap();
        assert_eq!(usd.value_a, Some(dec!(-100)));
    }

    #[test]
    fn stale_rate_leaves_values_empty() {
        let (conn, now) = setup();
        set_rate(&conn, "IDR", dec!(0.0000625), "manual", now).unwrap();
        set_rate(&conn, "BTC", dec!(60000), "manual", now - chrono::Duration::days(5)).unwrap();
        let mut v = Valuer::new(&conn, policy(now)).unwrap();
        let btc = v.value("BTC", dec!(1)).unwrap();
        assert_eq!(btc.value_a, None);
        assert_eq!(btc.value_b, None);
        assert!(btc.unresolved.unwrap().contains("stale"));
    }

    #[test]
    fn missing_reference_b_rate_only_drops_value_b() {
        let (conn, now) = setup();
        set_rate(&conn, "BTC", dec!(60000), "manual", now).unwrap();
        let mut v = Valuer::new(&conn, policy(now)).unwrap();
        let btc = v.value("BTC", dec!(1)).unwrap();
        assert_eq!(btc.value_a, Some(dec!(60000)));
        assert_eq!(btc.value_b, None);
    }
}
