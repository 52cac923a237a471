// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::Context;
use crate::coordinator::{Coordinator, RunReport, RunStatus, SourceSelection};
use crate::lock::RunLock;
use crate::sources::build_sources;
use crate::utils::{fmt_ts, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::error;

/// Run one ingestion batch and map the outcome to a run status. Errors that
/// abort the run are logged here and reported as a status, never bubbled.
pub async fn handle(ctx: &Context, conn: &mut Connection, m: &clap::ArgMatches) -> RunStatus {
    match run(ctx, conn, m).await {
        Ok(report) => report.status,
        Err(e) => {
            let status = match e.downcast_ref::<crate::error::Error>() {
                Some(err) => RunStatus::for_error(err),
                None => RunStatus::Failure,
            };
            error!(error = %e, status = ?status, "ingest aborted");
            eprintln!("ingest: {e:#}");
            status
        }
    }
}

async fn run(ctx: &Context, conn: &mut Connection, m: &clap::ArgMatches) -> Result<RunReport> {
    let selection = match m.get_many::<String>("sources") {
        Some(names) => SourceSelection::Named(names.map(|s| s.trim().to_string()).collect()),
        None => SourceSelection::All,
    };
    let coordinator = Coordinator::from_config(
        &ctx.config,
        build_sources(&ctx.config)?,
        Arc::clone(&ctx.clock),
    )?;
    let lock = RunLock::path_for(&ctx.db_path, "ingest");
    let report = coordinator.run_locked(conn, &selection, &lock).await?;

    if m.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report)
}

fn print_report(report: &RunReport) {
    let data = report
        .sources
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                if s.ok { "ok" } else { "failed" }.to_string(),
                s.facts.to_string(),
                s.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Source", "Status", "Facts", "Error"], data));
    println!(
        "Batch {}: {:?}, {} rows written, {} zeros reconciled, {} unpriced{}",
        fmt_ts(&report.batch_timestamp),
        report.status,
        report.inserted,
        report.synthesized_zeros,
        report.unpriced,
        if report.already_recorded {
            " (already recorded)"
        } else {
            ""
        }
    );
    for w in &report.warnings {
        println!("warning: {w}");
    }
}
