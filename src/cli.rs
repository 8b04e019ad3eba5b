use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::dates::{CenturyRule, Granularity};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Explore ad-hoc CSV and JSON exports without a predefined schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show inferred column roles, data kind and colour for each dataset
    Probe(ProbeArgs),
    /// Compute headline KPIs for the combined, filtered datasets
    Kpi(KpiArgs),
    /// Aggregate a value column by category
    Categories(CategoriesArgs),
    /// Bucket values over time by day, week or month
    Timeline(TimelineArgs),
    /// Total values per calendar month across all years
    Months(MonthsArgs),
    /// List the distinct values of each filterable column
    Facets(FacetsArgs),
    /// Merge two datasets into a single CSV
    Merge(MergeArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum GranularityArg {
    Day,
    Week,
    #[default]
    Month,
}

impl From<GranularityArg> for Granularity {
    fn from(value: GranularityArg) -> Self {
        match value {
            GranularityArg::Day => Granularity::Day,
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
        }
    }
}

/// Placement of two-digit years.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum CenturyArg {
    /// Years below 50 land in the 2000s, the rest in the 1900s
    Pivot,
    /// Every two-digit year lands in the 2000s
    Current,
}

impl From<CenturyArg> for CenturyRule {
    fn from(value: CenturyArg) -> Self {
        match value {
            CenturyArg::Pivot => CenturyRule::default(),
            CenturyArg::Current => CenturyRule::AlwaysCurrent,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Input CSV, TSV or JSON file (repeatable)
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// YAML session file listing datasets and filters
    #[arg(long, conflicts_with = "inputs")]
    pub session: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// How two-digit years are expanded
    #[arg(long = "two-digit-years", value_enum)]
    pub century: Option<CenturyArg>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Earliest date to include (inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// Latest date to include (inclusive)
    #[arg(long)]
    pub to: Option<String>,
    /// Keep rows whose column matches one of the values, e.g. `Region=North,South`
    #[arg(long = "select", action = clap::ArgAction::Append)]
    pub select: Vec<String>,
    /// Keep rows whose column equals the value exactly, e.g. `Product=Widget`
    #[arg(long = "drill", action = clap::ArgAction::Append)]
    pub drill: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct KpiArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Column to group by (defaults to the detected category column)
    #[arg(long)]
    pub category: Option<String>,
    /// Column to sum (defaults to the detected value column)
    #[arg(long)]
    pub value: Option<String>,
    /// Keep this many categories and fold the rest into "Other" (0 keeps all)
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct TimelineArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Bucket size
    #[arg(long, value_enum, default_value_t = GranularityArg::Month)]
    pub granularity: GranularityArg,
    /// Date column (defaults to the detected date column)
    #[arg(long = "date-column")]
    pub date_column: Option<String>,
    /// Value column (defaults to the detected value column)
    #[arg(long = "value-column")]
    pub value_column: Option<String>,
    /// Emit one series per active dataset instead of the combined series
    #[arg(long = "by-dataset")]
    pub by_dataset: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct MonthsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct FacetsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// First dataset; its rows come first
    #[arg(long)]
    pub left: PathBuf,
    /// Second dataset
    #[arg(long)]
    pub right: PathBuf,
    /// Left-join on this column instead of concatenating
    #[arg(long)]
    pub key: Option<String>,
    /// Name of the merged dataset (defaults to "<left> + <right>")
    #[arg(long)]
    pub name: Option<String>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character for both inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
