// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{Error, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Balancebook", "balancebook"));

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP.0, APP.1, APP.2).ok_or_else(|| {
        Error::InvalidInput("could not determine platform-specific data dir".into())
    })
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("balancebook.sqlite"))
}

/// Open the ledger at `path`, creating the file, parent directory and schema
/// as needed.
pub fn open_or_init(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS currencies(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL
            CHECK(type IN ('fiat','crypto','stablecoin','stock','etf','metal')),
        name TEXT,
        parent_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        FOREIGN KEY(parent_id) REFERENCES currencies(id) ON DELETE RESTRICT
    );

    CREATE TABLE IF NOT EXISTS providers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL
            CHECK(type IN ('exchange','wallet','bank','cash','brokerage','loan')),
        provider_id INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
        FOREIGN KEY(provider_id) REFERENCES providers(id) ON DELETE RESTRICT
    );

    -- Accounts are archived, never deleted.
    CREATE TRIGGER IF NOT EXISTS accounts_no_delete
    BEFORE DELETE ON accounts
    BEGIN
        SELECT RAISE(ABORT, 'accounts cannot be deleted; archive them instead');
    END;

    CREATE TABLE IF NOT EXISTS symbol_mappings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        currency_id INTEGER NOT NULL,
        source TEXT NOT NULL,
        symbol TEXT NOT NULL,
        is_inverted INTEGER NOT NULL DEFAULT 0 CHECK(is_inverted IN (0, 1)),
        is_primary INTEGER NOT NULL DEFAULT 0 CHECK(is_primary IN (0, 1)),
        UNIQUE(currency_id, source, symbol),
        FOREIGN KEY(currency_id) REFERENCES currencies(id) ON DELETE RESTRICT
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_symbol_mappings_primary
        ON symbol_mappings(currency_id, source) WHERE is_primary = 1;

    CREATE TABLE IF NOT EXISTS contract_mappings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network TEXT NOT NULL,
        contract_address TEXT NOT NULL, -- lower-case
        currency_id INTEGER NOT NULL,
        decimals INTEGER NOT NULL CHECK(decimals >= 0),
        is_native INTEGER NOT NULL DEFAULT 0 CHECK(is_native IN (0, 1)),
        UNIQUE(network, contract_address),
        FOREIGN KEY(currency_id) REFERENCES currencies(id) ON DELETE RESTRICT
    );

    -- Latest known rate per currency, in units of reference_a. Overwritten in place.
    CREATE TABLE IF NOT EXISTS rates(
        currency_id INTEGER PRIMARY KEY,
        rate TEXT NOT NULL,
        source TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(currency_id) REFERENCES currencies(id) ON DELETE RESTRICT
    );

    CREATE TABLE IF NOT EXISTS balances(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        account_id INTEGER NOT NULL,
        currency_id INTEGER NOT NULL,
        quantity TEXT NOT NULL,
        value_a TEXT,
        value_b TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(timestamp, account_id, currency_id),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE RESTRICT,
        FOREIGN KEY(currency_id) REFERENCES currencies(id) ON DELETE RESTRICT
    );
    CREATE INDEX IF NOT EXISTS idx_balances_pair_ts
        ON balances(account_id, currency_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_balances_ts ON balances(timestamp);
    CREATE INDEX IF NOT EXISTS idx_balances_account_ts ON balances(account_id, timestamp);

    CREATE TRIGGER IF NOT EXISTS balances_no_update
    BEFORE UPDATE ON balances
    BEGIN
        SELECT RAISE(ABORT, 'balances are append-only');
    END;
    CREATE TRIGGER IF NOT EXISTS balances_no_delete
    BEFORE DELETE ON balances
    BEGIN
        SELECT RAISE(ABORT, 'balances are append-only');
    END;

    CREATE TABLE IF NOT EXISTS net_worth_history(
        snapshot_date TEXT PRIMARY KEY, -- YYYY-MM-DD
        assets_a TEXT NOT NULL,
        liabilities_a TEXT NOT NULL,
        net_worth_a TEXT NOT NULL,
        assets_b TEXT NOT NULL,
        liabilities_b TEXT NOT NULL,
        net_worth_b TEXT NOT NULL,
        num_balances INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    )?;
    Ok(())
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM settings WHERE key=?1", [key], |r| r.get(0))
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Pin the two reference currencies on first use. Valuations already in the
/// ledger are expressed in them, so a later change is rejected.
pub fn ensure_references(conn: &Connection, reference_a: &str, reference_b: &str) -> Result<()> {
    for (key, wanted) in [("reference_a", reference_a), ("reference_b", reference_b)] {
        match get_setting(conn, key)? {
            Some(existing) if existing != wanted => {
                return Err(Error::IntegrityViolation(format!(
                    "{key} is {existing} in this ledger, configuration asks for {wanted}"
                )));
            }
            Some(_) => {}
            None => set_setting(conn, key, wanted)?,
        }
    }
    Ok(())
}
