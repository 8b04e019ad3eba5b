//! Category and time-period aggregation.
//!
//! These are pure functions over a row slice. Unparseable numbers count as 0,
//! missing categories fall into [`UNKNOWN_CATEGORY`], and rows whose date does
//! not normalize are left out of time buckets only.

use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap},
};

use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;

use crate::{
    classify::ColumnProfile,
    dates::{DateNormalizer, Granularity, month_name, sort_month_names},
    rules::TIME_SERIES_VALUE,
    value::Row,
};

pub const UNKNOWN_CATEGORY: &str = "Unknown";
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAggregate {
    pub name: String,
    pub total: f64,
    pub count: usize,
    pub average: f64,
}

impl CategoryAggregate {
    fn new(name: String, total: f64, count: usize) -> Self {
        let average = if count > 0 { total / count as f64 } else { 0.0 };
        Self {
            name,
            total,
            count,
            average,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub period: String,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Default)]
struct CategoryAccumulator {
    buckets: HashMap<String, (f64, usize)>,
}

impl CategoryAccumulator {
    fn ingest(&mut self, name: String, value: f64) {
        let bucket = self.buckets.entry(name).or_insert((0.0, 0));
        bucket.0 += value;
        bucket.1 += 1;
    }

    fn into_sorted(self) -> Vec<CategoryAggregate> {
        let mut items = self
            .buckets
            .into_iter()
            .map(|(name, (total, count))| CategoryAggregate::new(name, total, count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        items
    }
}

fn category_key(row: &Row, column: &str) -> String {
    let text = row.text(column);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        UNKNOWN_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Groups by the category's text, sums the value column, and sorts by
/// descending total (ties by name).
pub fn aggregate_by_category<R: Borrow<Row>>(
    rows: &[R],
    category_column: &str,
    value_column: &str,
) -> Vec<CategoryAggregate> {
    let mut accumulator = CategoryAccumulator::default();
    for row in rows {
        let row = row.borrow();
        let value = row
            .get(value_column)
            .map(|value| value.number_or_zero())
            .unwrap_or(0.0);
        accumulator.ingest(category_key(row, category_column), value);
    }
    accumulator.into_sorted()
}

/// Keeps the first `limit` entries and folds the rest into one
/// [`OTHER_CATEGORY`] entry. A limit of 0 keeps everything.
pub fn top_n(mut aggregates: Vec<CategoryAggregate>, limit: usize) -> Vec<CategoryAggregate> {
    if limit == 0 || aggregates.len() <= limit {
        return aggregates;
    }
    let rest = aggregates.split_off(limit);
    let (total, count) = rest
        .iter()
        .fold((0.0, 0usize), |(total, count), item| {
            (total + item.total, count + item.count)
        });
    aggregates.push(CategoryAggregate::new(OTHER_CATEGORY.to_string(), total, count));
    aggregates
}

/// Time series over the detected date column and primary value column.
/// Returns an empty series when either column is missing.
pub fn time_series<R: Borrow<Row>>(rows: &[R], granularity: Granularity) -> Vec<TimeSeriesPoint> {
    let profile = ColumnProfile::detect(rows);
    let Some(date_column) = profile.date_column.as_deref() else {
        debug!("No date column detected; time series is empty");
        return Vec::new();
    };
    let Some(value_column) = TIME_SERIES_VALUE.select_column(&profile.numeric_columns) else {
        debug!("No numeric column detected; time series is empty");
        return Vec::new();
    };
    time_series_for(
        rows,
        date_column,
        value_column,
        granularity,
        &DateNormalizer::default(),
    )
}

pub fn time_series_for<R: Borrow<Row>>(
    rows: &[R],
    date_column: &str,
    value_column: &str,
    granularity: Granularity,
    normalizer: &DateNormalizer,
) -> Vec<TimeSeriesPoint> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in rows {
        let row = row.borrow();
        let Some(date) = row
            .get(date_column)
            .and_then(|value| normalizer.normalize_value(value))
        else {
            skipped += 1;
            continue;
        };
        let bucket = buckets
            .entry(granularity.bucket_start(date))
            .or_insert((0.0, 0));
        bucket.0 += row.number(value_column).unwrap_or(0.0);
        bucket.1 += 1;
    }
    if skipped > 0 {
        debug!("Skipped {skipped} row(s) with unparseable '{date_column}' values");
    }
    buckets
        .into_iter()
        .map(|(bucket, (value, count))| TimeSeriesPoint {
            period: granularity.period_key(bucket),
            value,
            count,
        })
        .collect()
}

/// Totals per calendar month name across all years, in calendar order.
pub fn monthly_profile<R: Borrow<Row>>(rows: &[R]) -> Vec<CategoryAggregate> {
    let profile = ColumnProfile::detect(rows);
    let (Some(date_column), Some(value_column)) = (
        profile.date_column.as_deref(),
        TIME_SERIES_VALUE.select_column(&profile.numeric_columns),
    ) else {
        return Vec::new();
    };
    let normalizer = DateNormalizer::default();
    let mut accumulator = CategoryAccumulator::default();
    for row in rows {
        let row = row.borrow();
        let Some(date) = row
            .get(date_column)
            .and_then(|value| normalizer.normalize_value(value))
        else {
            continue;
        };
        if let Some(name) = month_name(date.month()) {
            accumulator.ingest(name.to_string(), row.number(value_column).unwrap_or(0.0));
        }
    }
    let mut by_name = accumulator
        .into_sorted()
        .into_iter()
        .map(|item| (item.name.clone(), item))
        .collect::<HashMap<_, _>>();
    let mut names = by_name.keys().cloned().collect::<Vec<_>>();
    sort_month_names(&mut names);
    names
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}
