// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Source adapters: anything that can report `(account, currency, quantity)`
//! holdings. New sources implement [`SourceAdapter`] and are registered in
//! [`build_sources`]; the coordinator never changes for them.

use crate::config::{Config, HoldingConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::models::Fact;
use crate::utils::parse_decimal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique name, used for selection and in run reports.
    fn name(&self) -> &str;

    /// Report current holdings. An empty list is a valid answer and means
    /// the source holds nothing.
    async fn collect(&self, since_hint: Option<DateTime<Utc>>) -> Result<Vec<Fact>>;
}

/// Holdings reported by hand in a CSV file with an
/// `account,currency,quantity` header.
#[derive(Debug, Clone)]
pub struct CsvSource {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvHolding {
    account: String,
    currency: String,
    quantity: String,
}

impl CsvSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<Fact>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let mut out = Vec::new();
        for (i, rec) in rdr.deserialize::<CsvHolding>().enumerate() {
            let rec = rec?;
            if rec.account.is_empty() && rec.currency.is_empty() {
                continue;
            }
            let quantity = parse_decimal(&rec.quantity).map_err(|_| {
                Error::InvalidInput(format!(
                    "{}: line {}: invalid quantity '{}'",
                    self.path.display(),
                    i + 2,
                    rec.quantity
                ))
            })?;
            out.push(Fact::new(rec.account, rec.currency.to_uppercase(), quantity));
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _since_hint: Option<DateTime<Utc>>) -> Result<Vec<Fact>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let facts = self.parse(&text)?;
        debug!(source = %self.name, facts = facts.len(), "csv holdings read");
        Ok(facts)
    }
}

/// Fixed holdings listed directly in the configuration file.
#[derive(Debug, Clone)]
pub struct ManualSource {
    name: String,
    facts: Vec<Fact>,
}

impl ManualSource {
    pub fn new(name: impl Into<String>, facts: Vec<Fact>) -> Self {
        Self {
            name: name.into(),
            facts,
        }
    }

    fn from_config(name: &str, holdings: &[HoldingConfig]) -> Result<Self> {
        let facts = holdings
            .iter()
            .map(|h| {
                Ok(Fact::new(
                    h.account.trim(),
                    h.currency.trim().to_uppercase(),
                    parse_decimal(&h.quantity)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(name, facts))
    }
}

#[async_trait]
impl SourceAdapter for ManualSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _since_hint: Option<DateTime<Utc>>) -> Result<Vec<Fact>> {
        Ok(self.facts.clone())
    }
}

/// Instantiate every configured source, in configuration order.
pub fn build_sources(config: &Config) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    config
        .sources
        .iter()
        .map(|s| -> Result<Arc<dyn SourceAdapter>> {
            let adapter: Arc<dyn SourceAdapter> = match s {
                SourceConfig::Csv { name, path } => Arc::new(CsvSource::new(name, path)),
                SourceConfig::Manual { name, holdings } => {
                    Arc::new(ManualSource::from_config(name, holdings)?)
                }
            };
            Ok(adapter)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[tokio::test]
    async fn csv_source_reads_holdings() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "account,currency,quantity").unwrap();
        writeln!(f, "BCA, idr ,15000000").unwrap();
        writeln!(f, "Mortgage,IDR,-250000000").unwrap();
        writeln!(f, ",,").unwrap();
        let src = CsvSource::new("fiat", f.path());
        let facts = src.collect(None).await.unwrap();
        assert_eq!(
            facts,
            vec![
                Fact::new("BCA", "IDR", dec!(15000000)),
                Fact::new("Mortgage", "IDR", dec!(-250000000)),
            ]
        );
    }

    #[tokio::test]
    async fn csv_source_reports_bad_quantity() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "account,currency,quantity\nBCA,IDR,lots").unwrap();
        let err = CsvSource::new("fiat", f.path()).collect(None).await.unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn missing_csv_file_is_an_error_not_empty() {
        let src = CsvSource::new("fiat", "/nonexistent/holdings.csv");
        assert!(src.collect(None).await.is_err());
    }

    #[test]
    fn build_sources_follows_config() {
        let cfg = Config::parse(
            r#"
            [[sources]]
            name = "cash"
            kind = "manual"
            holdings = [{ account = "Wallet", currency = "usd", quantity = "40" }]
            [[sources]]
            name = "fiat"
            kind = "csv"
            path = "/tmp/fiat.csv"
            "#,
        )
        .unwrap();
        let sources = build_sources(&cfg).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["cash", "fiat"]);
    }
}
