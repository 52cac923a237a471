// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use balancebook::clock::SystemClock;
use balancebook::commands::{self, Context};
use balancebook::config::Config;
use balancebook::coordinator::RunStatus;
use balancebook::{cli, db, error};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

fn load_context(matches: &clap::ArgMatches) -> Result<Context> {
    let config_path = match matches.get_one::<String>("config") {
        Some(p) => PathBuf::from(p),
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Load config {}", config_path.display()))?;
    let db_path = match matches.get_one::<String>("db") {
        Some(p) => PathBuf::from(p),
        None => config.database_path()?,
    };
    Ok(Context {
        config,
        db_path,
        clock: Arc::new(SystemClock),
    })
}

async fn dispatch(ctx: &Context, matches: &clap::ArgMatches) -> Result<RunStatus> {
    let mut conn = db::open_or_init(&ctx.db_path)
        .with_context(|| format!("Open ledger {}", ctx.db_path.display()))?;
    db::ensure_references(
        &conn,
        &ctx.config.reference_a()?,
        &ctx.config.reference_b()?,
    )?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Ledger initialized at {}", ctx.db_path.display());
        }
        Some(("currency", sub)) => commands::currencies::handle(&conn, sub)?,
        Some(("mapping", sub)) => commands::mappings::handle(&conn, sub)?,
        Some(("account", sub)) => commands::accounts::handle(&conn, sub)?,
        Some(("rate", sub)) => commands::rates::handle(ctx, &conn, sub).await?,
        Some(("ingest", sub)) => return Ok(commands::ingest::handle(ctx, &mut conn, sub).await),
        Some(("snapshot", sub)) => commands::snapshot::snapshot(ctx, &conn, sub)?,
        Some(("backfill", sub)) => commands::snapshot::backfill(ctx, &conn, sub)?,
        Some(("report", sub)) => commands::reports::handle(ctx, &conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(ctx, &conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(RunStatus::Success)
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    let status = match load_context(&matches) {
        Ok(ctx) => match dispatch(&ctx, &matches).await {
            Ok(status) => status,
            Err(e) => {
                eprintln!("error: {e:#}");
                e.downcast_ref::<error::Error>()
                    .map(RunStatus::for_error)
                    .unwrap_or(RunStatus::Failure)
            }
        },
        Err(e) => {
            eprintln!("error: {e:#}");
            RunStatus::Failure
        }
    };
    ExitCode::from(status.exit_code())
}
