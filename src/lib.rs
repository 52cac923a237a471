// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod models;
pub mod networth;
pub mod prices;
pub mod rates;
pub mod registry;
pub mod reports;
pub mod sources;
pub mod utils;
