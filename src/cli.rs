// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .conflicts_with("jsonl")
            .help("Print as a JSON array"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print one JSON object per line"),
    )
}

fn date_range(cmd: Command) -> Command {
    cmd.arg(Arg::new("from").long("from").help("First date, YYYY-MM-DD"))
        .arg(Arg::new("to").long("to").help("Last date, YYYY-MM-DD"))
}

pub fn build_cli() -> Command {
    command!()
        .name("balancebook")
        .about("Append-only multi-source balance ledger with daily net-worth snapshots")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Configuration file (default: platform config dir/balancebook.toml)"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .help("Ledger database, overrides the configured path"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(Command::new("init").about("Create the ledger and pin the reference currencies"))
        .subcommand(
            Command::new("currency")
                .about("Manage currencies")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("code").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .value_parser(["fiat", "crypto", "stablecoin", "stock", "etf", "metal"]),
                        )
                        .arg(Arg::new("name").long("name"))
                        .arg(Arg::new("parent").long("parent").help("Inherit this currency's rate")),
                )
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("set-parent")
                        .about("Link a currency to a parent for rate inheritance")
                        .arg(Arg::new("code").required(true))
                        .arg(Arg::new("parent").help("Omit to clear the link")),
                ),
        )
        .subcommand(
            Command::new("mapping")
                .about("Map currencies to price symbols and on-chain contracts")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("currency").required(true))
                        .arg(Arg::new("source").required(true).help("Source class, e.g. yahoo"))
                        .arg(Arg::new("symbol").required(true))
                        .arg(
                            Arg::new("inverted")
                                .long("inverted")
                                .action(ArgAction::SetTrue)
                                .help("Quote is priced the other way round; store its reciprocal"),
                        )
                        .arg(Arg::new("primary").long("primary").action(ArgAction::SetTrue)),
                )
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("add-contract")
                        .arg(Arg::new("network").required(true))
                        .arg(Arg::new("address").required(true))
                        .arg(Arg::new("currency").required(true))
                        .arg(
                            Arg::new("decimals")
                                .long("decimals")
                                .value_parser(clap::value_parser!(u32))
                                .default_value("18"),
                        )
                        .arg(Arg::new("native").long("native").action(ArgAction::SetTrue)),
                ),
        )
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .value_parser(["exchange", "wallet", "bank", "cash", "brokerage", "loan"]),
                        )
                        .arg(Arg::new("provider").long("provider").required(true))
                        .arg(Arg::new("notes").long("notes")),
                )
                .subcommand(
                    Command::new("list").arg(
                        Arg::new("all")
                            .long("all")
                            .action(ArgAction::SetTrue)
                            .help("Include archived accounts"),
                    ),
                )
                .subcommand(Command::new("archive").arg(Arg::new("name").required(true))),
        )
        .subcommand(
            Command::new("rate")
                .about("Latest rates, in units of the first reference currency")
                .subcommand_required(true)
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("currency").required(true))
                        .arg(Arg::new("rate").required(true))
                        .arg(Arg::new("source").long("source").default_value("manual")),
                )
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("stale")
                        .arg(Arg::new("max-age").long("max-age").help("e.g. 24h; default from config")),
                )
                .subcommand(Command::new("refresh").about("Fetch quotes for every mapped currency")),
        )
        .subcommand(
            Command::new("ingest")
                .about("Collect balances from sources and record one batch")
                .arg(
                    Arg::new("sources")
                        .long("sources")
                        .num_args(1..)
                        .value_delimiter(',')
                        .help("Only these sources; skips zero-balance reconciliation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run report as JSON"),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Save the net-worth snapshot for today")
                .arg(Arg::new("date").long("date").help("Snapshot a past date from ledger history")),
        )
        .subcommand(
            Command::new("backfill")
                .about("Save net-worth snapshots for a range of past dates")
                .arg(Arg::new("from").long("from").required(true))
                .arg(Arg::new("to").long("to").required(true)),
        )
        .subcommand(
            Command::new("report")
                .about("Reporting views")
                .subcommand_required(true)
                .subcommand(json_flags(
                    Command::new("latest").arg(
                        Arg::new("zero")
                            .long("include-zero")
                            .action(ArgAction::SetTrue)
                            .help("Show positions that went to zero"),
                    ),
                ))
                .subcommand(json_flags(Command::new("by-currency")))
                .subcommand(json_flags(Command::new("by-provider")))
                .subcommand(json_flags(Command::new("by-class")))
                .subcommand(json_flags(Command::new("summary")))
                .subcommand(json_flags(date_range(Command::new("history"))))
                .subcommand(json_flags(
                    Command::new("ledger-history")
                        .about("Daily totals recomputed from every ledger row"),
                )),
        )
        .subcommand(
            Command::new("export")
                .about("Write a reporting view to a file")
                .arg(
                    Arg::new("view")
                        .required(true)
                        .value_parser(["latest", "by-currency", "by-provider", "by-class", "history", "ledger"]),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["csv", "json"])
                        .default_value("csv"),
                )
                .arg(Arg::new("out").long("out").required(true)),
        )
        .subcommand(Command::new("doctor").about("Check rates, mappings and parent links"))
}
