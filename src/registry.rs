// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Reference data: currencies, accounts, providers and the mappings from
//! currencies to external price symbols and on-chain contracts.

use crate::error::{Error, Result};
use crate::models::{
    Account, AccountType, ContractMapping, Currency, CurrencyType, Rate, SymbolMapping,
};
use crate::rates::{self, RatePolicy};
use crate::utils::normalize_code;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Longest allowed currency -> parent -> ... chain, counted in links.
pub const MAX_PARENT_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Currencies

pub fn add_currency(
    conn: &Connection,
    code: &str,
    ctype: CurrencyType,
    name: Option<&str>,
) -> Result<i64> {
    let code = normalize_code(code)?;
    conn.execute(
        "INSERT INTO currencies(code, type, name) VALUES (?1, ?2, ?3)",
        params![code, ctype.as_str(), name],
    )?;
    info!(currency = %code, r#type = %ctype, "currency added");
    Ok(conn.last_insert_rowid())
}

pub fn currency_id(conn: &Connection, code: &str) -> Result<i64> {
    let code = normalize_code(code)?;
    conn.query_row("SELECT id FROM currencies WHERE code=?1", [&code], |r| r.get(0))
        .optional()?
        .ok_or_else(|| Error::not_found("currency", code))
}

/// Code -> id for every registered currency.
pub fn currency_ids(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare_cached("SELECT code, id FROM currencies")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut out = HashMap::new();
    for row in rows {
        let (code, id) = row?;
        out.insert(code, id);
    }
    Ok(out)
}

const CURRENCY_SELECT: &str = "SELECT c.id, c.code, c.type, c.name, p.code
     FROM currencies c LEFT JOIN currencies p ON c.parent_id = p.id";

fn currency_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, Option<String>, Option<String>)> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

pub fn get_currency(conn: &Connection, code: &str) -> Result<Currency> {
    let code = normalize_code(code)?;
    let row = conn
        .query_row(
            &format!("{CURRENCY_SELECT} WHERE c.code=?1"),
            [&code],
            currency_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("currency", code.clone()))?;
    let (id, code, ctype, name, parent) = row;
    Ok(Currency {
        id,
        code,
        r#type: ctype.parse()?,
        name,
        parent,
    })
}

pub fn list_currencies(conn: &Connection) -> Result<Vec<Currency>> {
    let mut stmt = conn.prepare(&format!("{CURRENCY_SELECT} ORDER BY c.code"))?;
    let rows = stmt.query_map([], currency_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, code, ctype, name, parent) = row?;
        out.push(Currency {
            id,
            code,
            r#type: ctype.parse()?,
            name,
            parent,
        });
    }
    Ok(out)
}

fn parent_links(conn: &Connection) -> Result<HashMap<i64, Option<i64>>> {
    let mut stmt = conn.prepare_cached("SELECT id, parent_id FROM currencies")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?)))?;
    let mut out = HashMap::new();
    for row in rows {
        let (id, parent) = row?;
        out.insert(id, parent);
    }
    Ok(out)
}

/// Number of links from `start` to its root, or `None` if the walk cycles or
/// runs past the depth bound.
fn chain_len(links: &HashMap<i64, Option<i64>>, start: i64) -> Option<usize> {
    let mut seen = HashSet::from([start]);
    let mut cur = start;
    let mut len = 0;
    while let Some(Some(parent)) = links.get(&cur) {
        len += 1;
        if len > MAX_PARENT_DEPTH || !seen.insert(*parent) {
            return None;
        }
        cur = *parent;
    }
    Some(len)
}

/// Link `code` to `parent` for rate inheritance, or clear the link with `None`.
///
/// The link is rejected if any currency's chain would cycle or exceed
/// [`MAX_PARENT_DEPTH`], so valuation never has to deal with either.
pub fn set_parent(conn: &Connection, code: &str, parent: Option<&str>) -> Result<()> {
    let child_id = currency_id(conn, code)?;
    let parent_id = parent.map(|p| currency_id(conn, p)).transpose()?;

    if let Some(pid) = parent_id {
        if pid == child_id {
            return Err(Error::IntegrityViolation(format!(
                "{} cannot be its own parent",
                code.trim().to_uppercase()
            )));
        }
        let mut links = parent_links(conn)?;
        links.insert(child_id, Some(pid));
        for id in links.keys() {
            if chain_len(&links, *id).is_none() {
                return Err(Error::IntegrityViolation(format!(
                    "linking {} to {} would create a cycle or a chain deeper than {}",
                    code.trim().to_uppercase(),
                    parent.unwrap_or_default().trim().to_uppercase(),
                    MAX_PARENT_DEPTH
                )));
            }
        }
    }

    conn.execute(
        "UPDATE currencies SET parent_id=?1 WHERE id=?2",
        params![parent_id, child_id],
    )?;
    Ok(())
}

/// `code` followed by its ancestors, root last.
pub fn parent_chain(conn: &Connection, code: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT p.code FROM currencies c JOIN currencies p ON c.parent_id = p.id WHERE c.code=?1",
    )?;
    let first = get_currency(conn, code)?.code;
    let mut chain = vec![first.clone()];
    let mut cur = first;
    while let Some(parent) = stmt
        .query_row([&cur], |r| r.get::<_, String>(0))
        .optional()?
    {
        if chain.len() > MAX_PARENT_DEPTH || chain.contains(&parent) {
            return Err(Error::IntegrityViolation(format!(
                "parent chain of {} is cyclic or deeper than {}",
                chain[0], MAX_PARENT_DEPTH
            )));
        }
        chain.push(parent.clone());
        cur = parent;
    }
    Ok(chain)
}

/// Outcome of looking up the rate used to value a currency.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Fresh(Rate),
    /// A rate exists but is older than the policy allows.
    Stale(Rate),
    Missing,
}

impl Resolved {
    pub fn usable(&self) -> Option<Decimal> {
        match self {
            Resolved::Fresh(r) => Some(r.rate),
            _ => None,
        }
    }
}

/// Resolve the rate for `code`, inheriting from the root of its parent chain.
/// The reference currency itself is always worth exactly 1.
pub fn resolve_rate(conn: &Connection, code: &str, policy: &RatePolicy) -> Result<Resolved> {
    let chain = parent_chain(conn, code)?;
    let root = chain.last().cloned().unwrap_or_default();
    if root == policy.reference_a {
        return Ok(Resolved::Fresh(Rate {
            currency: root,
            rate: Decimal::ONE,
            source: "reference".to_string(),
            updated_at: policy.now,
        }));
    }
    match rates::get_rate(conn, &root)? {
        None => Ok(Resolved::Missing),
        Some(rate) if policy.is_stale(&rate) => Ok(Resolved::Stale(rate)),
        Some(rate) => Ok(Resolved::Fresh(rate)),
    }
}

// ---------------------------------------------------------------------------
// Symbol and contract mappings

pub fn add_mapping(
    conn: &Connection,
    currency: &str,
    source: &str,
    symbol: &str,
    inverted: bool,
    primary: bool,
) -> Result<()> {
    let id = currency_id(conn, currency)?;
    let source = source.trim().to_lowercase();
    if primary {
        let existing: Option<String> = conn
            .query_row(
                "SELECT symbol FROM symbol_mappings WHERE currency_id=?1 AND source=?2 AND is_primary=1",
                params![id, source],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            return Err(Error::IntegrityViolation(format!(
                "{} already has primary symbol '{}' for '{}'",
                currency.trim().to_uppercase(),
                existing,
                source
            )));
        }
    }
    conn.execute(
        "INSERT INTO symbol_mappings(currency_id, source, symbol, is_inverted, is_primary)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, source, symbol.trim(), inverted, primary],
    )?;
    Ok(())
}

pub fn resolve_primary_symbol(
    conn: &Connection,
    currency: &str,
    source_class: &str,
) -> Result<SymbolMapping> {
    let code = normalize_code(currency)?;
    let source = source_class.trim().to_lowercase();
    conn.query_row(
        "SELECT sm.symbol, sm.is_inverted FROM symbol_mappings sm
         JOIN currencies c ON sm.currency_id = c.id
         WHERE c.code=?1 AND sm.source=?2 AND sm.is_primary=1",
        params![code, source],
        |r| Ok((r.get::<_, String>(0)?, r.get::<_, bool>(1)?)),
    )
    .optional()?
    .map(|(symbol, inverted)| SymbolMapping {
        currency: code.clone(),
        source: source.clone(),
        symbol,
        inverted,
        primary: true,
    })
    .ok_or(Error::NotMapped {
        currency: code.clone(),
        source_class: source.clone(),
    })
}

pub fn list_mappings(conn: &Connection) -> Result<Vec<SymbolMapping>> {
    let mut stmt = conn.prepare(
        "SELECT c.code, sm.source, sm.symbol, sm.is_inverted, sm.is_primary
         FROM symbol_mappings sm JOIN currencies c ON sm.currency_id = c.id
         ORDER BY c.code, sm.source, sm.is_primary DESC, sm.symbol",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(SymbolMapping {
            currency: r.get(0)?,
            source: r.get(1)?,
            symbol: r.get(2)?,
            inverted: r.get(3)?,
            primary: r.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn add_contract(
    conn: &Connection,
    network: &str,
    contract_address: &str,
    currency: &str,
    decimals: u32,
    is_native: bool,
) -> Result<()> {
    let id = currency_id(conn, currency)?;
    conn.execute(
        "INSERT INTO contract_mappings(network, contract_address, currency_id, decimals, is_native)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            network.trim().to_lowercase(),
            contract_address.trim().to_lowercase(),
            id,
            decimals,
            is_native
        ],
    )?;
    Ok(())
}

pub fn resolve_contract(
    conn: &Connection,
    network: &str,
    contract_address: &str,
) -> Result<Option<ContractMapping>> {
    let m = conn
        .query_row(
            "SELECT cm.network, cm.contract_address, c.code, cm.decimals, cm.is_native
             FROM contract_mappings cm JOIN currencies c ON cm.currency_id = c.id
             WHERE cm.network=?1 AND cm.contract_address=?2",
            params![
                network.trim().to_lowercase(),
                contract_address.trim().to_lowercase()
            ],
            |r| {
                Ok(ContractMapping {
                    network: r.get(0)?,
                    contract_address: r.get(1)?,
                    currency: r.get(2)?,
                    decimals: r.get(3)?,
                    is_native: r.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(m)
}

// ---------------------------------------------------------------------------
// Providers and accounts

fn ensure_provider(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO providers(name) VALUES (?1)",
        [name],
    )?;
    let id = conn.query_row("SELECT id FROM providers WHERE name=?1", [name], |r| r.get(0))?;
    Ok(id)
}

pub fn add_account(
    conn: &Connection,
    name: &str,
    atype: AccountType,
    provider: &str,
    notes: Option<&str>,
) -> Result<i64> {
    let name = name.trim();
    let provider = provider.trim();
    if name.is_empty() || provider.is_empty() {
        return Err(Error::InvalidInput(
            "account name and provider must not be empty".into(),
        ));
    }
    let provider_id = ensure_provider(conn, provider)?;
    conn.execute(
        "INSERT INTO accounts(name, type, provider_id, notes) VALUES (?1, ?2, ?3, ?4)",
        params![name, atype.as_str(), provider_id, notes],
    )?;
    info!(account = %name, r#type = %atype, provider = %provider, "account added");
    Ok(conn.last_insert_rowid())
}

/// Archive instead of delete: the ledger keeps referencing the account and
/// it may still appear in new facts, but reporting hides it.
pub fn archive_account(conn: &Connection, name: &str) -> Result<()> {
    let n = conn.execute(
        "UPDATE accounts SET is_active=0 WHERE name=?1",
        [name.trim()],
    )?;
    if n == 0 {
        return Err(Error::not_found("account", name.trim()));
    }
    info!(account = %name.trim(), "account archived");
    Ok(())
}

const ACCOUNT_SELECT: &str = "SELECT a.id, a.name, a.type, p.name, a.is_active, a.notes
     FROM accounts a JOIN providers p ON a.provider_id = p.id";

fn account_from_row(
    r: &rusqlite::Row<'_>,
) -> rusqlite::Result<(i64, String, String, String, bool, Option<String>)> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
}

pub fn get_account(conn: &Connection, name: &str) -> Result<Account> {
    let (id, name, atype, provider, active, notes) = conn
        .query_row(
            &format!("{ACCOUNT_SELECT} WHERE a.name=?1"),
            [name.trim()],
            account_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("account", name.trim()))?;
    Ok(Account {
        id,
        name,
        r#type: atype.parse()?,
        provider,
        active,
        notes,
    })
}

pub fn list_accounts(conn: &Connection, include_inactive: bool) -> Result<Vec<Account>> {
    let sql = if include_inactive {
        format!("{ACCOUNT_SELECT} ORDER BY a.name")
    } else {
        format!("{ACCOUNT_SELECT} WHERE a.is_active=1 ORDER BY a.name")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], account_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, atype, provider, active, notes) = row?;
        out.push(Account {
            id,
            name,
            r#type: atype.parse()?,
            provider,
            active,
            notes,
        });
    }
    Ok(out)
}

/// Name -> id for every account, archived ones included.
pub fn account_ids(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare_cached("SELECT name, id FROM accounts")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut out = HashMap::new();
    for row in rows {
        let (name, id) = row?;
        out.insert(name, id);
    }
    Ok(out)
}
