// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::Error;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyType {
    Fiat,
    Crypto,
    Stablecoin,
    Stock,
    Etf,
    Metal,
}

impl CurrencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyType::Fiat => "fiat",
            CurrencyType::Crypto => "crypto",
            CurrencyType::Stablecoin => "stablecoin",
            CurrencyType::Stock => "stock",
            CurrencyType::Etf => "etf",
            CurrencyType::Metal => "metal",
        }
    }
}

impl FromStr for CurrencyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fiat" => Ok(CurrencyType::Fiat),
            "crypto" => Ok(CurrencyType::Crypto),
            "stablecoin" => Ok(CurrencyType::Stablecoin),
            "stock" => Ok(CurrencyType::Stock),
            "etf" => Ok(CurrencyType::Etf),
            "metal" => Ok(CurrencyType::Metal),
            other => Err(Error::InvalidInput(format!(
                "unknown currency type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Exchange,
    Wallet,
    Bank,
    Cash,
    Brokerage,
    Loan,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Exchange => "exchange",
            AccountType::Wallet => "wallet",
            AccountType::Bank => "bank",
            AccountType::Cash => "cash",
            AccountType::Brokerage => "brokerage",
            AccountType::Loan => "loan",
        }
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exchange" => Ok(AccountType::Exchange),
            "wallet" => Ok(AccountType::Wallet),
            "bank" => Ok(AccountType::Bank),
            "cash" => Ok(AccountType::Cash),
            "brokerage" => Ok(AccountType::Brokerage),
            "loan" => Ok(AccountType::Loan),
            other => Err(Error::InvalidInput(format!("unknown account type '{other}'"))),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub code: String,
    pub r#type: CurrencyType,
    pub name: Option<String>,
    /// Code of the currency whose rate this one inherits.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub r#type: AccountType,
    pub provider: String,
    pub active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub currency: String,
    pub source: String,
    pub symbol: String,
    /// The external quote is reference-per-currency; store 1/quote.
    pub inverted: bool,
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMapping {
    pub network: String,
    pub contract_address: String,
    pub currency: String,
    pub decimals: u32,
    pub is_native: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub currency: String,
    /// Units of reference_a per 1 unit of `currency`.
    pub rate: Decimal,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

/// An observed holding as reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub account: String,
    pub currency: String,
    pub quantity: Decimal,
}

impl Fact {
    pub fn new(account: impl Into<String>, currency: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            account: account.into(),
            currency: currency.into(),
            quantity,
        }
    }
}

/// A valued fact ready to be appended to the ledger under a batch timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub account: String,
    pub currency: String,
    pub quantity: Decimal,
    /// `None` when the currency could not be priced; never zero for that case.
    pub value_a: Option<Decimal>,
    pub value_b: Option<Decimal>,
}

/// A ledger row joined with its account and currency reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestBalance {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    pub account_type: AccountType,
    pub provider: String,
    pub currency: String,
    pub currency_type: CurrencyType,
    pub quantity: Decimal,
    pub value_a: Option<Decimal>,
    pub value_b: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub snapshot_date: NaiveDate,
    pub assets_a: Decimal,
    /// Magnitude of negative holdings; net worth is assets minus liabilities.
    pub liabilities_a: Decimal,
    pub net_worth_a: Decimal,
    pub assets_b: Decimal,
    pub liabilities_b: Decimal,
    pub net_worth_b: Decimal,
    pub num_balances: i64,
}
