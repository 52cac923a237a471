// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! TOML configuration. Every key is optional; a missing file yields defaults.
//!
//! ```toml
//! database = "/var/lib/balancebook/ledger.sqlite"
//! reference_a = "USD"
//! reference_b = "IDR"
//! max_rate_age = "48h"
//! source_timeout = "60s"
//!
//! [prices]
//! source = "yahoo"
//!
//! [[sources]]
//! name = "fiat"
//! kind = "csv"
//! path = "/home/me/fiat.csv"
//!
//! [[sources]]
//! name = "cash"
//! kind = "manual"
//! holdings = [{ account = "Wallet", currency = "USD", quantity = "40" }]
//! ```

use crate::db;
use crate::error::{Error, Result};
use crate::utils::{normalize_code, parse_duration};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_reference_a() -> String {
    "USD".to_string()
}

fn default_reference_b() -> String {
    "IDR".to_string()
}

fn default_max_rate_age() -> String {
    "48h".to_string()
}

fn default_source_timeout() -> String {
    "60s".to_string()
}

fn default_price_source() -> String {
    "yahoo".to_string()
}

fn default_price_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: Option<PathBuf>,
    #[serde(default = "default_reference_a")]
    pub reference_a: String,
    #[serde(default = "default_reference_b")]
    pub reference_b: String,
    #[serde(default = "default_max_rate_age")]
    pub max_rate_age: String,
    #[serde(default = "default_source_timeout")]
    pub source_timeout: String,
    #[serde(default)]
    pub prices: PriceConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceConfig {
    /// Symbol-mapping source class used by `rate refresh`.
    #[serde(default = "default_price_source")]
    pub source: String,
    #[serde(default = "default_price_base_url")]
    pub base_url: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            source: default_price_source(),
            base_url: default_price_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Csv { name: String, path: PathBuf },
    Manual { name: String, holdings: Vec<HoldingConfig> },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Csv { name, .. } | SourceConfig::Manual { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldingConfig {
    pub account: String,
    pub currency: String,
    pub quantity: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            reference_a: default_reference_a(),
            reference_b: default_reference_b(),
            max_rate_age: default_max_rate_age(),
            source_timeout: default_source_timeout(),
            prices: PriceConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        Ok(db::project_dirs()?.config_dir().join("balancebook.toml"))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn validate(&self) -> Result<()> {
        normalize_code(&self.reference_a)?;
        normalize_code(&self.reference_b)?;
        self.max_rate_age()?;
        self.source_timeout()?;
        let mut seen = std::collections::HashSet::new();
        for s in &self.sources {
            if !seen.insert(s.name()) {
                return Err(Error::InvalidInput(format!(
                    "source '{}' is configured twice",
                    s.name()
                )));
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(p) => Ok(p.clone()),
            None => db::default_db_path(),
        }
    }

    pub fn reference_a(&self) -> Result<String> {
        normalize_code(&self.reference_a)
    }

    pub fn reference_b(&self) -> Result<String> {
        normalize_code(&self.reference_b)
    }

    pub fn max_rate_age(&self) -> Result<Duration> {
        parse_duration(&self.max_rate_age)
    }

    pub fn source_timeout(&self) -> Result<Duration> {
        parse_duration(&self.source_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.reference_a().unwrap(), "USD");
        assert_eq!(cfg.reference_b().unwrap(), "IDR");
        assert_eq!(cfg.max_rate_age().unwrap(), Duration::from_secs(48 * 3600));
        assert_eq!(cfg.source_timeout().unwrap(), Duration::from_secs(60));
        assert_eq!(cfg.prices.source, "yahoo");
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn sources_are_tagged_by_kind() {
        let cfg = Config::parse(
            r#"
            reference_b = "sgd"
            [[sources]]
            name = "fiat"
            kind = "csv"
            path = "/tmp/fiat.csv"

            [[sources]]
            name = "cash"
            kind = "manual"
            holdings = [{ account = "Wallet", currency = "USD", quantity = "40" }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.reference_b().unwrap(), "SGD");
        assert_eq!(cfg.sources.len(), 2);
        assert!(matches!(&cfg.sources[0], SourceConfig::Csv { name, .. } if name == "fiat"));
        match &cfg.sources[1] {
            SourceConfig::Manual { holdings, .. } => assert_eq!(holdings[0].quantity, "40"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let err = Config::parse(
            r#"
            [[sources]]
            name = "a"
            kind = "manual"
            holdings = []
            [[sources]]
            name = "a"
            kind = "manual"
            holdings = []
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(Config::parse(r#"max_rate_age = "soon""#).is_err());
    }
}
