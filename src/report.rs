//! Command handlers. Each one builds a [`Workspace`] from the command line
//! (or a session file), runs the engine over the filtered rows and prints a
//! table or JSON document to stdout. Diagnostics go to the log.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    aggregate::{self, CategoryAggregate, TimeSeriesPoint},
    classify::{ColumnProfile, ColumnRole},
    cli::{
        CategoriesArgs, FacetsArgs, FilterArgs, KpiArgs, MergeArgs, MonthsArgs, OutputFormat,
        ProbeArgs, SourceArgs, TimelineArgs,
    },
    combine::{MergeStrategy, Workspace},
    dataset::{DataKind, DatasetId},
    dates::{DateNormalizer, Granularity},
    filter::{
        FilterMode, FilterOptions, FilterState, filter_options, parse_date_bound_with,
        parse_drill_down, parse_selection,
    },
    identity::{DatasetType, classify_dataset_type},
    kpi::{self, KpiSummary, NumericColumnStats, PrimaryColumns},
    loader, printable_delimiter,
    rules::TIME_SERIES_VALUE,
    session::SessionConfig,
    table::{self, headers},
    value::{Row, format_number},
};

/// Loads the datasets named by `--input` or `--session` into a workspace.
pub fn load_workspace(source: &SourceArgs) -> Result<Workspace> {
    let encoding = loader::resolve_encoding(source.input_encoding.as_deref())?;
    if let Some(delimiter) = source.delimiter {
        debug!("Using delimiter '{}'", printable_delimiter(delimiter));
    }
    let workspace = match &source.session {
        Some(path) => {
            info!("Loading session {path:?}");
            let mut session = SessionConfig::load(path)?;
            if let Some(century) = source.century {
                session.century = Some(century.into());
            }
            session.build_workspace(source.delimiter, encoding)?
        }
        None => {
            if source.inputs.is_empty() {
                bail!("Provide at least one --input file or a --session file");
            }
            let mut workspace = Workspace::new();
            if let Some(century) = source.century {
                workspace.set_century_rule(century.into());
            }
            for path in &source.inputs {
                load_into(&mut workspace, path, source.delimiter, encoding)?;
            }
            workspace
        }
    };
    for dataset in workspace.datasets() {
        for warning in dataset.validation_warnings() {
            warn!("{warning}");
        }
    }
    Ok(workspace)
}

fn load_into(
    workspace: &mut Workspace,
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<DatasetId> {
    let rows = loader::load_dataset_rows(path, delimiter, encoding)
        .with_context(|| format!("Loading dataset {path:?}"))?;
    Ok(workspace.add_dataset(
        loader::display_name_for(path),
        loader::file_name_for(path),
        rows,
    ))
}

/// Layers command-line filters on top of whatever the session configured.
/// A single `--from` or `--to` keeps the other bound. Bounds are read with
/// the workspace's century rule.
pub fn apply_filter_args(
    args: &FilterArgs,
    normalizer: &DateNormalizer,
    state: &mut FilterState,
) -> Result<()> {
    if args.from.is_some() || args.to.is_some() {
        let current = state.date_range().unwrap_or_default();
        let start = match &args.from {
            Some(raw) => Some(parse_date_bound_with(raw, normalizer).context("Parsing --from")?),
            None => current.start,
        };
        let end = match &args.to {
            Some(raw) => Some(parse_date_bound_with(raw, normalizer).context("Parsing --to")?),
            None => current.end,
        };
        state.set_date_range(start, end);
    }
    for expr in &args.select {
        let (column, values) =
            parse_selection(expr).with_context(|| format!("Parsing --select '{expr}'"))?;
        state.select_values(column, values);
    }
    for expr in &args.drill {
        let (column, value) =
            parse_drill_down(expr).with_context(|| format!("Parsing --drill '{expr}'"))?;
        state.add_drill_down(column, value);
    }
    Ok(())
}

fn prepare(source: &SourceArgs, filters: &FilterArgs) -> Result<Workspace> {
    let mut workspace = load_workspace(source)?;
    let normalizer = *workspace.date_normalizer();
    apply_filter_args(filters, &normalizer, workspace.filters_mut())?;
    debug!("Active filter layers: {:?}", workspace.filters().mode());
    Ok(workspace)
}

fn emit_json<T: Serialize>(payload: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(payload).context("Serializing report to JSON")?;
    println!("{text}");
    Ok(())
}

fn amount(value: f64) -> String {
    format_number((value * 100.0).round() / 100.0)
}

fn optional_amount(value: Option<f64>) -> String {
    value.map(amount).unwrap_or_default()
}

/// An explicit column must exist somewhere in the loaded data; without one the
/// detected column (if any) is used.
fn pick_column(
    explicit: Option<&str>,
    detected: Option<&str>,
    known: &[String],
) -> Result<Option<String>> {
    match explicit {
        Some(name) if known.iter().any(|column| column == name) => Ok(Some(name.to_string())),
        Some(name) => bail!("Column '{name}' not found in the selected datasets"),
        None => Ok(detected.map(str::to_string)),
    }
}

fn known_columns(workspace: &Workspace) -> Vec<String> {
    loader::union_columns(&workspace.combined_rows())
}

#[derive(Debug, Serialize)]
struct ColumnReport {
    name: String,
    role: ColumnRole,
}

#[derive(Debug, Serialize)]
struct DatasetReport<'a> {
    id: DatasetId,
    name: &'a str,
    file_name: &'a str,
    kind: DataKind,
    dataset_type: DatasetType,
    color: &'static str,
    row_count: usize,
    active: bool,
    columns: Vec<ColumnReport>,
    warnings: Vec<String>,
}

pub fn probe(args: &ProbeArgs) -> Result<()> {
    let workspace = load_workspace(&args.source)?;
    let reports = workspace
        .datasets()
        .iter()
        .map(|dataset| DatasetReport {
            id: dataset.id(),
            name: dataset.name(),
            file_name: dataset.file_name(),
            kind: dataset.kind(),
            dataset_type: classify_dataset_type(dataset.name()),
            color: dataset.color(),
            row_count: dataset.row_count(),
            active: workspace.is_active(dataset.id()),
            columns: dataset
                .profile()
                .columns
                .into_iter()
                .map(|(name, role)| ColumnReport { name, role })
                .collect(),
            warnings: dataset.validation_warnings(),
        })
        .collect::<Vec<_>>();
    info!("Probed {} dataset(s)", reports.len());

    match args.format {
        OutputFormat::Json => emit_json(&reports),
        OutputFormat::Table => {
            let mut output = String::new();
            for report in &reports {
                let title = format!(
                    "{} ({}) kind={} type={} color={} rows={}{}",
                    report.name,
                    report.file_name,
                    report.kind,
                    report.dataset_type,
                    report.color,
                    report.row_count,
                    if report.active { "" } else { " inactive" }
                );
                let rows = report
                    .columns
                    .iter()
                    .map(|column| vec![column.name.clone(), column.role.to_string()])
                    .collect::<Vec<_>>();
                output.push_str(&table::render_section(
                    &title,
                    &headers(&["column", "role"]),
                    &rows,
                ));
                for warning in &report.warnings {
                    output.push_str(&format!("warning: {warning}\n"));
                }
                output.push('\n');
            }
            print!("{output}");
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct DatasetKpis<'a> {
    dataset: &'a str,
    color: &'static str,
    summary: KpiSummary,
}

#[derive(Debug, Serialize)]
struct KpiReport<'a> {
    filters: FilterMode,
    summary: KpiSummary,
    datasets: Vec<DatasetKpis<'a>>,
    numeric_columns: Vec<NumericColumnStats>,
}

pub fn kpi(args: &KpiArgs) -> Result<()> {
    let workspace = prepare(&args.source, &args.filters)?;
    let rows = workspace.filtered_rows();
    let datasets = workspace
        .breakdown()
        .into_iter()
        .map(|slice| {
            let rows = workspace
                .filters()
                .apply_with(slice.rows, workspace.date_normalizer());
            DatasetKpis {
                dataset: slice.dataset_name,
                color: slice.color,
                summary: kpi::calculate_kpis(&rows),
            }
        })
        .collect();
    let report = KpiReport {
        filters: workspace.filters().mode(),
        summary: kpi::calculate_kpis(&rows),
        datasets,
        numeric_columns: kpi::numeric_column_stats(&rows),
    };
    info!(
        "Computed KPIs over {} row(s) from {} active dataset(s)",
        report.summary.total_records,
        report.datasets.len()
    );

    match args.format {
        OutputFormat::Json => emit_json(&report),
        OutputFormat::Table => {
            let summary = &report.summary;
            let summary_rows = vec![
                vec!["records".to_string(), summary.total_records.to_string()],
                vec!["total value".to_string(), amount(summary.total_value)],
                vec!["average value".to_string(), amount(summary.average_value)],
                vec![
                    "unique categories".to_string(),
                    summary.unique_categories.to_string(),
                ],
                vec![
                    "value column".to_string(),
                    summary.primary_value_column.clone().unwrap_or_default(),
                ],
                vec![
                    "category column".to_string(),
                    summary.primary_category_column.clone().unwrap_or_default(),
                ],
            ];
            let dataset_rows = report
                .datasets
                .iter()
                .map(|entry| {
                    vec![
                        entry.dataset.to_string(),
                        entry.summary.total_records.to_string(),
                        amount(entry.summary.total_value),
                        amount(entry.summary.average_value),
                        entry.summary.unique_categories.to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            let stats_rows = report
                .numeric_columns
                .iter()
                .map(|stats| {
                    vec![
                        stats.column.clone(),
                        stats.count.to_string(),
                        optional_amount(stats.min),
                        optional_amount(stats.max),
                        optional_amount(stats.mean),
                        optional_amount(stats.median),
                        optional_amount(stats.std_dev),
                    ]
                })
                .collect::<Vec<_>>();
            let mut output = table::render_section(
                "Summary",
                &headers(&["metric", "value"]),
                &summary_rows,
            );
            output.push('\n');
            output.push_str(&table::render_section(
                "Datasets",
                &headers(&["dataset", "records", "total", "average", "categories"]),
                &dataset_rows,
            ));
            output.push('\n');
            output.push_str(&table::render_section(
                "Numeric columns",
                &headers(&["column", "count", "min", "max", "mean", "median", "std_dev"]),
                &stats_rows,
            ));
            print!("{output}");
            Ok(())
        }
    }
}

fn aggregate_rows(aggregates: &[CategoryAggregate]) -> Vec<Vec<String>> {
    aggregates
        .iter()
        .map(|item| {
            vec![
                item.name.clone(),
                amount(item.total),
                item.count.to_string(),
                amount(item.average),
            ]
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct CategoryReport {
    category_column: Option<String>,
    value_column: Option<String>,
    categories: Vec<CategoryAggregate>,
}

pub fn categories(args: &CategoriesArgs) -> Result<()> {
    let workspace = prepare(&args.source, &args.filters)?;
    let known = known_columns(&workspace);
    let rows = workspace.filtered_rows();
    let primary = PrimaryColumns::detect(&rows);
    let category_column = pick_column(args.category.as_deref(), primary.category.as_deref(), &known)?;
    let value_column = pick_column(args.value.as_deref(), primary.value.as_deref(), &known)?;

    let categories = match (&category_column, &value_column) {
        (Some(category), Some(value)) => {
            aggregate::top_n(aggregate::aggregate_by_category(&rows, category, value), args.top)
        }
        (None, _) if !rows.is_empty() => {
            warn!("No categorical column detected; choose one with --category");
            Vec::new()
        }
        (_, None) if !rows.is_empty() => {
            warn!("No numeric column detected; choose one with --value");
            Vec::new()
        }
        _ => Vec::new(),
    };
    info!("Aggregated {} row(s) into {} categories", rows.len(), categories.len());
    let report = CategoryReport {
        category_column,
        value_column,
        categories,
    };

    match args.format {
        OutputFormat::Json => emit_json(&report),
        OutputFormat::Table => {
            let title = format!(
                "{} by {}",
                report.value_column.as_deref().unwrap_or("value"),
                report.category_column.as_deref().unwrap_or("category")
            );
            print!(
                "{}",
                table::render_section(
                    &title,
                    &headers(&["category", "total", "count", "average"]),
                    &aggregate_rows(&report.categories),
                )
            );
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct SeriesReport {
    dataset: Option<String>,
    color: Option<&'static str>,
    date_column: Option<String>,
    value_column: Option<String>,
    points: Vec<TimeSeriesPoint>,
}

fn series_for(
    rows: &[&Row],
    args: &TimelineArgs,
    known: &[String],
    granularity: Granularity,
    normalizer: &DateNormalizer,
) -> Result<SeriesReport> {
    let profile = ColumnProfile::detect(rows);
    let date_column = pick_column(
        args.date_column.as_deref(),
        profile.date_column.as_deref(),
        known,
    )?;
    let value_column = pick_column(
        args.value_column.as_deref(),
        TIME_SERIES_VALUE.select_column(&profile.numeric_columns),
        known,
    )?;
    let points = match (&date_column, &value_column) {
        (Some(date), Some(value)) => {
            aggregate::time_series_for(rows, date, value, granularity, normalizer)
        }
        _ => {
            if !rows.is_empty() {
                warn!("Time series needs a date column and a numeric column");
            }
            Vec::new()
        }
    };
    Ok(SeriesReport {
        dataset: None,
        color: None,
        date_column,
        value_column,
        points,
    })
}

pub fn timeline(args: &TimelineArgs) -> Result<()> {
    let workspace = prepare(&args.source, &args.filters)?;
    let known = known_columns(&workspace);
    let granularity = Granularity::from(args.granularity);
    let normalizer = workspace.date_normalizer();

    let series = if args.by_dataset {
        workspace
            .breakdown()
            .into_iter()
            .map(|slice| -> Result<SeriesReport> {
                let rows = workspace.filters().apply_with(slice.rows, normalizer);
                let mut report = series_for(&rows, args, &known, granularity, normalizer)?;
                report.dataset = Some(slice.dataset_name.to_string());
                report.color = Some(slice.color);
                Ok(report)
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        let rows = workspace.filtered_rows();
        vec![series_for(&rows, args, &known, granularity, normalizer)?]
    };
    info!(
        "Built {} {granularity} series with {} point(s)",
        series.len(),
        series.iter().map(|s| s.points.len()).sum::<usize>()
    );

    match args.format {
        OutputFormat::Json if args.by_dataset => emit_json(&series),
        OutputFormat::Json => emit_json(&series[0]),
        OutputFormat::Table => {
            let mut output = String::new();
            for (idx, report) in series.iter().enumerate() {
                if idx > 0 {
                    output.push('\n');
                }
                let title = match (&report.dataset, report.color) {
                    (Some(name), Some(color)) => format!("{name} ({color})"),
                    _ => format!(
                        "{} per {granularity}",
                        report.value_column.as_deref().unwrap_or("value")
                    ),
                };
                let rows = report
                    .points
                    .iter()
                    .map(|point| {
                        vec![
                            point.period.clone(),
                            amount(point.value),
                            point.count.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>();
                output.push_str(&table::render_section(
                    &title,
                    &headers(&["period", "value", "count"]),
                    &rows,
                ));
            }
            print!("{output}");
            Ok(())
        }
    }
}

pub fn months(args: &MonthsArgs) -> Result<()> {
    let workspace = prepare(&args.source, &args.filters)?;
    let rows = workspace.filtered_rows();
    let profile = aggregate::monthly_profile(&rows);
    info!("Month profile covers {} month(s)", profile.len());
    match args.format {
        OutputFormat::Json => emit_json(&profile),
        OutputFormat::Table => {
            print!(
                "{}",
                table::render_section(
                    "Totals by month",
                    &headers(&["month", "total", "count", "average"]),
                    &aggregate_rows(&profile),
                )
            );
            Ok(())
        }
    }
}

pub fn facets(args: &FacetsArgs) -> Result<()> {
    let workspace = prepare(&args.source, &args.filters)?;
    let rows = workspace.filtered_rows();
    let options: Vec<FilterOptions> = filter_options(&rows);
    info!("Found {} filterable column(s)", options.len());
    match args.format {
        OutputFormat::Json => emit_json(&options),
        OutputFormat::Table => {
            let rows = options
                .iter()
                .map(|option| {
                    vec![
                        option.column.clone(),
                        option.values.len().to_string(),
                        option.values.join(", "),
                    ]
                })
                .collect::<Vec<_>>();
            print!(
                "{}",
                table::render_section(
                    "Filter options",
                    &headers(&["column", "distinct", "values"]),
                    &rows,
                )
            );
            Ok(())
        }
    }
}

pub fn merge(args: &MergeArgs) -> Result<()> {
    let encoding = loader::resolve_encoding(args.input_encoding.as_deref())?;
    let mut workspace = Workspace::new();
    let left = load_into(&mut workspace, &args.left, args.delimiter, encoding)?;
    let right = load_into(&mut workspace, &args.right, args.delimiter, encoding)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => format!(
            "{} + {}",
            loader::display_name_for(&args.left),
            loader::display_name_for(&args.right)
        ),
    };
    let strategy = match &args.key {
        Some(key) => MergeStrategy::KeyJoin { key: key.clone() },
        None => MergeStrategy::default(),
    };
    let merged = workspace.merge_datasets(left, right, name, &strategy)?;
    let dataset = workspace
        .dataset(merged)
        .ok_or_else(|| anyhow!("Merged dataset {merged} is missing"))?;
    loader::write_rows_csv(args.output.as_deref(), dataset.rows())?;
    info!(
        "Wrote {} merged row(s) for '{}'{}",
        dataset.row_count(),
        dataset.name(),
        args.output
            .as_ref()
            .map(|path| format!(" to {path:?}"))
            .unwrap_or_default()
    );
    Ok(())
}
