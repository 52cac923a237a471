// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{Context, required};
use crate::prices::{self, QuoteApiAdapter};
use crate::rates;
use crate::utils::{parse_decimal, parse_duration, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub async fn handle(ctx: &Context, conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let currency = required(sub, "currency")?;
            let rate = parse_decimal(required(sub, "rate")?)?;
            let source = required(sub, "source")?;
            rates::set_rate(conn, currency, rate, source, ctx.clock.now())?;
            println!(
                "{} = {} {}",
                currency.trim().to_uppercase(),
                rate,
                ctx.config.reference_a()?
            );
        }
        Some(("list", _)) => list_rates(ctx, conn)?,
        Some(("stale", sub)) => {
            let max_age = match sub.get_one::<String>("max-age") {
                Some(s) => parse_duration(s)?,
                None => ctx.config.max_rate_age()?,
            };
            let stale = rates::stale_rates(conn, max_age, ctx.clock.now())?;
            if stale.is_empty() {
                println!("All rates are fresher than {}h", max_age.as_secs() / 3600);
                return Ok(());
            }
            let data = stale
                .into_iter()
                .map(|(r, age)| {
                    vec![
                        r.currency,
                        r.rate.to_string(),
                        r.source,
                        r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        format!("{}h", age.as_secs() / 3600),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["Currency", "Rate", "Source", "Updated", "Age"], data)
            );
        }
        Some(("refresh", _)) => {
            let adapter = QuoteApiAdapter::new(
                ctx.config.prices.base_url.as_str(),
                ctx.config.source_timeout()?,
            )?;
            let report =
                prices::refresh_rates(conn, &adapter, &ctx.config.prices.source, ctx.clock.now())
                    .await?;
            println!(
                "Updated {} rates, {} failed",
                report.updated.len(),
                report.failed.len()
            );
            if !report.failed.is_empty() {
                let data = report
                    .failed
                    .into_iter()
                    .map(|(c, reason)| vec![c, reason])
                    .collect();
                println!("{}", pretty_table(&["Currency", "Error"], data));
            }
        }
        _ => {}
    }
    Ok(())
}

fn list_rates(ctx: &Context, conn: &Connection) -> Result<()> {
    let max_age = ctx.config.max_rate_age()?;
    let now = ctx.clock.now();
    let data = rates::list_rates(conn)?
        .into_iter()
        .map(|r| {
            let age = (now - r.updated_at).to_std().unwrap_or_default();
            vec![
                r.currency,
                r.rate.to_string(),
                r.source,
                r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                if age > max_age { "stale" } else { "" }.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Currency", "Rate", "Source", "Updated", ""], data)
    );
    Ok(())
}
