pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod combine;
pub mod dataset;
pub mod dates;
pub mod filter;
pub mod identity;
pub mod kpi;
pub mod loader;
pub mod report;
pub mod rules;
pub mod session;
pub mod table;
pub mod value;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetlens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => report::probe(&args),
        Commands::Kpi(args) => report::kpi(&args),
        Commands::Categories(args) => report::categories(&args),
        Commands::Timeline(args) => report::timeline(&args),
        Commands::Months(args) => report::months(&args),
        Commands::Facets(args) => report::facets(&args),
        Commands::Merge(args) => report::merge(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
