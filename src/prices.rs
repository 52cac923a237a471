// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Price adapters and the rate refresh job.

use crate::error::{Error, Result};
use crate::rates;
use crate::utils::http_client;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait PriceAdapter: Send + Sync {
    /// Latest quote for an external symbol, as the venue reports it.
    async fn fetch_rate(&self, symbol: &str) -> Result<Decimal>;
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct QuoteEnvelope {
    quoteResponse: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    result: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    symbol: Option<String>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

/// Yahoo-style `/v7/finance/quote` endpoint.
pub struct QuoteApiAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl QuoteApiAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceAdapter for QuoteApiAdapter {
    async fn fetch_rate(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/v7/finance/quote?symbols={}", self.base_url, symbol);
        let resp = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        let body: QuoteEnvelope = resp.json().await?;
        let px = body
            .quoteResponse
            .result
            .into_iter()
            .find(|q| q.symbol.as_deref() == Some(symbol))
            .and_then(|q| q.regular_market_price)
            .ok_or_else(|| Error::SourceUnavailable {
                name: "quotes".into(),
                reason: format!("no price for {symbol}"),
            })?;
        Decimal::try_from(px).map_err(|_| Error::SourceUnavailable {
            name: "quotes".into(),
            reason: format!("price {px} for {symbol} is not representable"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Currencies whose rate was written.
    pub updated: Vec<String>,
    /// Currency and reason for every fetch that did not produce a rate.
    pub failed: Vec<(String, String)>,
}

/// Stored rate for a raw quote: inverted quotes are reference-per-currency.
pub fn apply_inversion(raw: Decimal, inverted: bool) -> Result<Decimal> {
    if raw <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!("quote {raw} is not positive")));
    }
    if !inverted {
        return Ok(raw);
    }
    Decimal::ONE
        .checked_div(raw)
        .ok_or_else(|| Error::InvalidInput(format!("cannot invert quote {raw}")))
}

/// Fetch a fresh rate for every parent-less currency that has a primary
/// symbol for `source`. Child currencies inherit at valuation time, so they
/// are never fetched. Individual failures are logged and reported; they
/// never abort the refresh.
pub async fn refresh_rates(
    conn: &Connection,
    adapter: &dyn PriceAdapter,
    source: &str,
    now: DateTime<Utc>,
) -> Result<RefreshReport> {
    let source = source.trim().to_lowercase();
    let targets = {
        let mut stmt = conn.prepare(
            "SELECT c.code, sm.symbol, sm.is_inverted
             FROM symbol_mappings sm JOIN currencies c ON sm.currency_id = c.id
             WHERE sm.source=?1 AND sm.is_primary=1 AND c.parent_id IS NULL
             ORDER BY c.code",
        )?;
        let rows = stmt.query_map(params![source], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, bool>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out
    };

    let quotes = join_all(targets.iter().map(|(_, symbol, _)| adapter.fetch_rate(symbol))).await;

    let mut report = RefreshReport::default();
    for ((code, symbol, inverted), quote) in targets.into_iter().zip(quotes) {
        let stored = quote.and_then(|raw| apply_inversion(raw, inverted));
        match stored.and_then(|rate| rates::set_rate(conn, &code, rate, &source, now)) {
            Ok(()) => report.updated.push(code),
            Err(e) => {
                warn!(currency = %code, %symbol, error = %e, "rate refresh failed");
                report.failed.push((code, e.to_string()));
            }
        }
    }
    info!(
        source = %source,
        updated = report.updated.len(),
        failed = report.failed.len(),
        "rates refreshed"
    );
    Ok(report)
}
