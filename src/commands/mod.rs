// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod currencies;
pub mod doctor;
pub mod exporter;
pub mod ingest;
pub mod mappings;
pub mod rates;
pub mod reports;
pub mod snapshot;

use crate::clock::Clock;
use crate::config::Config;
use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::sync::Arc;

/// What every command needs besides the open ledger.
pub struct Context {
    pub config: Config,
    pub db_path: PathBuf,
    pub clock: Arc<dyn Clock>,
}

/// Value of an argument clap already enforces as required.
pub(crate) fn required<'a>(m: &'a clap::ArgMatches, id: &str) -> Result<&'a str> {
    m.get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{id}>"))
}
