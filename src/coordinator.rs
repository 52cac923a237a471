// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! One ingestion run: collect from sources, reconcile, value, append.
//!
//! Every row a run writes shares the batch timestamp captured when the run
//! starts, and the rows land in a single transaction or not at all.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger;
use crate::lock::RunLock;
use crate::models::{BalanceRow, Fact};
use crate::rates::{RatePolicy, Valuer};
use crate::registry;
use crate::sources::SourceAdapter;
use crate::utils::{fmt_ts, normalize_code, parse_ts};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Which sources a run queries. Only `All` can reconcile zero balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Something was recorded but at least one source failed or a fact was
    /// dropped.
    Partial,
    Failure,
    AlreadyRunning,
}

impl RunStatus {
    /// Process exit status reported to the scheduler.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::AlreadyRunning => 2,
            RunStatus::Partial => 3,
        }
    }

    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::ConcurrentRunDetected { .. } => RunStatus::AlreadyRunning,
            _ => RunStatus::Failure,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub name: String,
    pub ok: bool,
    pub facts: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub batch_timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub sources: Vec<SourceOutcome>,
    /// Zero-balance reconciliation ran for this batch.
    pub reconciled: bool,
    pub inserted: usize,
    /// Rows not written because the batch timestamp was already committed.
    pub skipped: usize,
    /// The whole batch had been committed by an earlier attempt.
    pub already_recorded: bool,
    pub synthesized_zeros: usize,
    /// Rows written without reference values.
    pub unpriced: usize,
    pub warnings: Vec<String>,
}

pub struct Coordinator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    clock: Arc<dyn Clock>,
    reference_a: String,
    reference_b: String,
    max_rate_age: Option<Duration>,
    timeout: Duration,
}

impl Coordinator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            adapters,
            clock,
            reference_a: "USD".to_string(),
            reference_b: "IDR".to_string(),
            max_rate_age: Some(Duration::from_secs(48 * 3600)),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(
        config: &Config,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self::new(adapters, clock)
            .with_references(&config.reference_a()?, &config.reference_b()?)
            .with_max_rate_age(Some(config.max_rate_age()?))
            .with_timeout(config.source_timeout()?))
    }

    pub fn with_references(mut self, reference_a: &str, reference_b: &str) -> Self {
        self.reference_a = reference_a.to_string();
        self.reference_b = reference_b.to_string();
        self
    }

    pub fn with_max_rate_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_rate_age = max_age;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adapters for `selection`, each at most once even if named repeatedly.
    fn select(&self, selection: &SourceSelection) -> Result<Vec<Arc<dyn SourceAdapter>>> {
        match selection {
            SourceSelection::All => Ok(self.adapters.clone()),
            SourceSelection::Named(names) => {
                let mut seen = HashSet::new();
                names
                    .iter()
                    .filter(|n| seen.insert(n.as_str()))
                    .map(|n| {
                        self.adapters
                            .iter()
                            .find(|a| a.name() == n.as_str())
                            .cloned()
                            .ok_or_else(|| Error::not_found("source", n.clone()))
                    })
                    .collect()
            }
        }
    }

    /// [`Coordinator::run`] while holding the exclusive run lock at
    /// `lock_path`. Fails fast with [`Error::ConcurrentRunDetected`] when
    /// another run holds it.
    pub async fn run_locked(
        &self,
        conn: &mut Connection,
        selection: &SourceSelection,
        lock_path: &Path,
    ) -> Result<RunReport> {
        let _lock = RunLock::acquire(lock_path)?;
        self.run(conn, selection).await
    }

    pub async fn run(
        &self,
        conn: &mut Connection,
        selection: &SourceSelection,
    ) -> Result<RunReport> {
        let batch_ts = self.clock.now();
        self.run_at(conn, selection, batch_ts).await
    }

    /// Run with an explicit batch timestamp. Retrying a committed batch with
    /// the same timestamp is a no-op.
    pub async fn run_at(
        &self,
        conn: &mut Connection,
        selection: &SourceSelection,
        batch_ts: DateTime<Utc>,
    ) -> Result<RunReport> {
        let selected = self.select(selection)?;
        let mut report = RunReport {
            batch_timestamp: batch_ts,
            status: RunStatus::Success,
            sources: Vec::new(),
            reconciled: false,
            inserted: 0,
            skipped: 0,
            already_recorded: false,
            synthesized_zeros: 0,
            unpriced: 0,
            warnings: Vec::new(),
        };
        if selected.is_empty() {
            warn!("no sources selected; nothing to ingest");
            report.warnings.push("no sources selected".to_string());
            report.status = RunStatus::Failure;
            return Ok(report);
        }

        let since_hint = last_batch(conn)?;
        info!(
            batch = %fmt_ts(&batch_ts),
            sources = selected.len(),
            "ingest started"
        );

        // Wait for every adapter before looking at any result: reconciliation
        // needs the complete picture.
        let timeout = self.timeout;
        let results = join_all(selected.iter().map(move |a| {
            let a = Arc::clone(a);
            async move {
                let name = a.name().to_string();
                let res = match tokio::time::timeout(timeout, a.collect(since_hint)).await {
                    Ok(Ok(facts)) => Ok(facts),
                    Ok(Err(e)) => Err(Error::SourceUnavailable {
                        name: name.clone(),
                        reason: e.to_string(),
                    }),
                    Err(_) => Err(Error::SourceUnavailable {
                        name: name.clone(),
                        reason: format!("timed out after {}s", timeout.as_secs_f64()),
                    }),
                };
                (name, res)
            }
        }))
        .await;

        let mut facts: Vec<Fact> = Vec::new();
        let mut failed = 0usize;
        for (name, res) in results {
            match res {
                Ok(batch) => {
                    debug!(source = %name, facts = batch.len(), "source collected");
                    report.sources.push(SourceOutcome {
                        name,
                        ok: true,
                        facts: batch.len(),
                        error: None,
                    });
                    facts.extend(batch);
                }
                Err(e) => {
                    warn!(source = %name, error = %e, "source failed; run is partial");
                    failed += 1;
                    report.warnings.push(e.to_string());
                    report.sources.push(SourceOutcome {
                        name,
                        ok: false,
                        facts: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if failed == selected.len() {
            error!("every selected source failed; nothing recorded");
            report.status = RunStatus::Failure;
            return Ok(report);
        }

        let (mut merged, dropped) = self.merge(conn, facts, &mut report.warnings)?;

        let complete = matches!(selection, SourceSelection::All) && failed == 0;
        if complete {
            report.synthesized_zeros = reconcile(conn, &mut merged)?;
            report.reconciled = true;
        } else {
            info!(failed, "zero-balance reconciliation skipped for partial run");
        }

        let rows = self.value(conn, batch_ts, merged, &mut report)?;

        if rows.is_empty() {
            info!(batch = %fmt_ts(&batch_ts), "nothing to record");
        } else {
            match ledger::append_batch(conn, batch_ts, &rows, self.clock.now()) {
                Ok(outcome) => report.inserted = outcome.inserted,
                Err(Error::DuplicateBatchKey { timestamp }) => {
                    info!(batch = %timestamp, "batch already recorded; skipping");
                    report.already_recorded = true;
                    report.skipped = rows.len();
                    report
                        .warnings
                        .push(format!("batch {timestamp} was already recorded; nothing written"));
                }
                Err(e) => return Err(e),
            }
        }

        if failed > 0 || dropped > 0 {
            report.status = RunStatus::Partial;
        }
        info!(
            batch = %fmt_ts(&batch_ts),
            status = ?report.status,
            inserted = report.inserted,
            zeros = report.synthesized_zeros,
            unpriced = report.unpriced,
            "ingest finished"
        );
        Ok(report)
    }

    /// Validate facts against the registry and sum facts that share an
    /// `(account, currency)` pair. Unknown currencies are dropped with a
    /// warning; unknown accounts abort the run.
    fn merge(
        &self,
        conn: &Connection,
        facts: Vec<Fact>,
        warnings: &mut Vec<String>,
    ) -> Result<(BTreeMap<(String, String), Decimal>, usize)> {
        let accounts = registry::account_ids(conn)?;
        let currencies = registry::currency_ids(conn)?;
        let mut merged: BTreeMap<(String, String), Decimal> = BTreeMap::new();
        let mut dropped = 0;
        for fact in facts {
            let account = fact.account.trim().to_string();
            if !accounts.contains_key(&account) {
                return Err(Error::IntegrityViolation(format!(
                    "fact references unknown account '{account}'"
                )));
            }
            let code = match normalize_code(&fact.currency) {
                Ok(c) if currencies.contains_key(&c) => c,
                _ => {
                    warn!(account = %account, currency = %fact.currency, "unknown currency; fact skipped");
                    warnings.push(format!(
                        "skipped {account}/{}: currency not registered",
                        fact.currency
                    ));
                    dropped += 1;
                    continue;
                }
            };
            let slot = merged.entry((account, code)).or_insert(Decimal::ZERO);
            *slot = slot.checked_add(fact.quantity).ok_or_else(|| {
                Error::InvalidInput(format!("quantity overflow summing {}", fact.currency))
            })?;
        }
        Ok((merged, dropped))
    }

    fn value(
        &self,
        conn: &Connection,
        batch_ts: DateTime<Utc>,
        merged: BTreeMap<(String, String), Decimal>,
        report: &mut RunReport,
    ) -> Result<Vec<BalanceRow>> {
        let policy = RatePolicy {
            reference_a: self.reference_a.clone(),
            reference_b: self.reference_b.clone(),
            max_age: self.max_rate_age,
            now: batch_ts,
        };
        let mut valuer = Valuer::new(conn, policy)?;
        let mut rows = Vec::with_capacity(merged.len());
        for ((account, currency), quantity) in merged {
            let v = valuer.value(&currency, quantity)?;
            if let Some(reason) = &v.unresolved {
                let err = Error::RateUnresolvable {
                    currency: currency.clone(),
                    reason: reason.clone(),
                };
                warn!(account = %account, error = %err, "recording quantity without value");
                report.warnings.push(err.to_string());
                report.unpriced += 1;
            }
            rows.push(BalanceRow {
                account,
                currency,
                quantity,
                value_a: v.value_a,
                value_b: v.value_b,
            });
        }
        Ok(rows)
    }
}

fn last_batch(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let ts: Option<String> = conn
        .query_row("SELECT MAX(timestamp) FROM balances", [], |r| r.get(0))
        .optional()?
        .flatten();
    ts.as_deref().map(parse_ts).transpose()
}

/// Add an explicit zero for every pair that held a positive quantity in the
/// latest view but was not reported at all this run. Returns how many zeros
/// were added.
fn reconcile(
    conn: &Connection,
    merged: &mut BTreeMap<(String, String), Decimal>,
) -> Result<usize> {
    let reported: HashSet<(String, String)> = merged.keys().cloned().collect();
    let mut added = 0;
    for bal in ledger::latest_per_account_currency(conn, None)? {
        if bal.quantity <= Decimal::ZERO {
            continue;
        }
        let key = (bal.account, bal.currency);
        if reported.contains(&key) {
            continue;
        }
        debug!(account = %key.0, currency = %key.1, "position gone; recording zero");
        merged.insert(key, Decimal::ZERO);
        added += 1;
    }
    Ok(added)
}
