//! Summary KPIs for a row-set.
//!
//! The value and category columns are guessed with the ordered keyword rules
//! in [`crate::rules`]; nothing here fails on malformed data.

use std::{borrow::Borrow, collections::HashSet};

use log::debug;
use serde::Serialize;

use crate::{
    classify::ColumnProfile,
    rules::{KPI_CATEGORY, KPI_VALUE},
    value::Row,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_records: usize,
    pub total_value: f64,
    pub average_value: f64,
    pub unique_categories: usize,
    pub primary_value_column: Option<String>,
    pub primary_category_column: Option<String>,
}

/// Columns the KPI calculator would use for a row-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrimaryColumns {
    pub value: Option<String>,
    pub category: Option<String>,
}

impl PrimaryColumns {
    pub fn detect<R: Borrow<Row>>(rows: &[R]) -> Self {
        Self::from_profile(&ColumnProfile::detect(rows))
    }

    pub fn from_profile(profile: &ColumnProfile) -> Self {
        Self {
            value: KPI_VALUE
                .select_column(&profile.numeric_columns)
                .map(str::to_string),
            category: KPI_CATEGORY
                .select_column(&profile.categorical_columns)
                .map(str::to_string),
        }
    }
}

pub fn calculate_kpis<R: Borrow<Row>>(rows: &[R]) -> KpiSummary {
    if rows.is_empty() {
        return KpiSummary::default();
    }
    let primary = PrimaryColumns::detect(rows);
    let total_records = rows.len();

    let total_value = primary.value.as_deref().map_or(0.0, |column| {
        rows.iter()
            .map(|row| row.borrow().number(column).unwrap_or(0.0))
            .sum()
    });

    let unique_categories = primary.category.as_deref().map_or(0, |column| {
        rows.iter()
            .map(|row| row.borrow().text(column).trim().to_string())
            .filter(|value| !value.is_empty())
            .collect::<HashSet<_>>()
            .len()
    });

    debug!(
        "KPIs over {total_records} row(s): value column {:?}, category column {:?}",
        primary.value, primary.category
    );

    KpiSummary {
        total_records,
        total_value,
        average_value: total_value / total_records as f64,
        unique_categories,
        primary_value_column: primary.value,
        primary_category_column: primary.category,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericColumnStats {
    pub column: String,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
}

#[derive(Debug, Default)]
struct ColumnStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
    min: Option<f64>,
    max: Option<f64>,
    values: Vec<f64>,
}

impl ColumnStats {
    fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn median(&mut self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        self.values.sort_by(f64::total_cmp);
        let mid = self.values.len() / 2;
        Some(if self.values.len() % 2 == 0 {
            (self.values[mid - 1] + self.values[mid]) / 2.0
        } else {
            self.values[mid]
        })
    }

    fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self.sum_sq / self.count as f64 - mean * mean;
        Some(variance.max(0.0).sqrt())
    }

    fn finish(mut self, column: String) -> NumericColumnStats {
        let median = self.median();
        NumericColumnStats {
            column,
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean(),
            median,
            std_dev: self.std_dev(),
        }
    }
}

/// Descriptive statistics for every numeric column, over the values that
/// parse as numbers.
pub fn numeric_column_stats<R: Borrow<Row>>(rows: &[R]) -> Vec<NumericColumnStats> {
    let profile = ColumnProfile::detect(rows);
    profile
        .numeric_columns
        .into_iter()
        .map(|column| {
            let mut stats = ColumnStats::default();
            for value in rows.iter().filter_map(|row| row.borrow().number(&column)) {
                stats.add_value(value);
            }
            stats.finish(column)
        })
        .collect()
}
