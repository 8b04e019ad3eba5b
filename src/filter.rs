//! Filter engine applied to the combined row-set.
//!
//! Three layers run in a fixed order and are ANDed together:
//!
//! 1. date range on the detected date column, inclusive on both ends;
//! 2. column-value selections, compared trimmed and case-insensitively;
//! 3. drill-down selections, compared exactly.
//!
//! An empty [`FilterState`] returns its input unchanged.

use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet},
};

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    classify::{ColumnProfile, find_date_column},
    dates::DateNormalizer,
    value::Row,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("Empty filter expression")]
    Empty,
    #[error("Filter '{0}' must look like column=value")]
    MissingEquals(String),
    #[error("Filter '{0}' does not name a column")]
    MissingColumn(String),
    #[error("Filter '{0}' does not list any values")]
    MissingValues(String),
    #[error("'{0}' is not a recognizable date")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Which filter layers are currently constraining rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterMode {
    pub date_range: bool,
    pub columns: bool,
    pub drill_down: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    date_range: Option<DateRange>,
    columns: BTreeMap<String, BTreeSet<String>>,
    drill_down: BTreeMap<String, String>,
}

fn normalize_choice(value: &str) -> String {
    value.trim().to_lowercase()
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the date range. Passing two open bounds clears it.
    pub fn set_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        let range = DateRange { start, end };
        self.date_range = (!range.is_unbounded()).then_some(range);
    }

    pub fn clear_date_range(&mut self) {
        self.date_range = None;
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// Replaces the selected values for a column. An empty selection removes
    /// the column's constraint.
    pub fn select_values<I, S>(&mut self, column: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let column = column.into();
        let selected = values
            .into_iter()
            .map(|value| normalize_choice(value.as_ref()))
            .filter(|value| !value.is_empty())
            .collect::<BTreeSet<_>>();
        if selected.is_empty() {
            self.columns.remove(&column);
        } else {
            self.columns.insert(column, selected);
        }
    }

    pub fn clear_column(&mut self, column: &str) {
        self.columns.remove(column);
    }

    pub fn selected_values(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.columns.get(column)
    }

    pub fn add_drill_down(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.drill_down.insert(column.into(), value.into());
    }

    pub fn remove_drill_down(&mut self, column: &str) {
        self.drill_down.remove(column);
    }

    pub fn drill_downs(&self) -> &BTreeMap<String, String> {
        &self.drill_down
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn mode(&self) -> FilterMode {
        FilterMode {
            date_range: self.date_range.is_some(),
            columns: !self.columns.is_empty(),
            drill_down: !self.drill_down.is_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mode() == FilterMode::default()
    }

    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        self.apply_with(rows, &DateNormalizer::default())
    }

    pub fn apply_with<'a, I>(&self, rows: I, normalizer: &DateNormalizer) -> Vec<&'a Row>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let rows = rows.into_iter().collect::<Vec<_>>();
        if self.is_empty() {
            return rows;
        }
        let date_column = match self.date_range {
            Some(_) => {
                let column = find_date_column(&rows);
                if column.is_none() {
                    debug!("Date range ignored: no date column in the combined rows");
                }
                column
            }
            None => None,
        };
        let before = rows.len();
        let kept = rows
            .into_iter()
            .filter(|row| self.matches(row, date_column.as_deref(), normalizer))
            .collect::<Vec<_>>();
        debug!("Filters kept {} of {} row(s)", kept.len(), before);
        kept
    }

    fn matches(&self, row: &Row, date_column: Option<&str>, normalizer: &DateNormalizer) -> bool {
        if let (Some(range), Some(column)) = (self.date_range, date_column) {
            let in_range = row
                .get(column)
                .and_then(|value| normalizer.normalize_value(value))
                .is_some_and(|date| range.contains(date));
            if !in_range {
                return false;
            }
        }
        let columns_match = self.columns.iter().all(|(column, selected)| {
            selected.contains(&normalize_choice(&row.text(column)))
        });
        if !columns_match {
            return false;
        }
        self.drill_down
            .iter()
            .all(|(column, expected)| row.text(column) == *expected)
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn split_assignment(expr: &str) -> Result<(&str, &str), FilterParseError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(FilterParseError::Empty);
    }
    let (column, value) = trimmed
        .split_once('=')
        .ok_or_else(|| FilterParseError::MissingEquals(trimmed.to_string()))?;
    let column = unquote(column.trim());
    if column.is_empty() {
        return Err(FilterParseError::MissingColumn(trimmed.to_string()));
    }
    Ok((column, value.trim()))
}

/// Parses `column=a,b,c` into a column and its selected values.
pub fn parse_selection(expr: &str) -> Result<(String, Vec<String>), FilterParseError> {
    let (column, raw_values) = split_assignment(expr)?;
    let values = raw_values
        .split(',')
        .map(|value| unquote(value.trim()).to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    if values.is_empty() {
        return Err(FilterParseError::MissingValues(expr.trim().to_string()));
    }
    Ok((column.to_string(), values))
}

/// Parses `column=value` into a drill-down pair. The value is kept verbatim
/// apart from surrounding quotes.
pub fn parse_drill_down(expr: &str) -> Result<(String, String), FilterParseError> {
    let (column, value) = split_assignment(expr)?;
    Ok((column.to_string(), unquote(value).to_string()))
}

pub fn parse_date_bound(raw: &str) -> Result<NaiveDate, FilterParseError> {
    parse_date_bound_with(raw, &DateNormalizer::default())
}

/// Parses a range bound with the same century rule the rows are read with.
pub fn parse_date_bound_with(
    raw: &str,
    normalizer: &DateNormalizer,
) -> Result<NaiveDate, FilterParseError> {
    normalizer
        .normalize(raw)
        .ok_or_else(|| FilterParseError::InvalidDate(raw.trim().to_string()))
}

/// Distinct values of one filterable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub column: String,
    pub values: Vec<String>,
}

/// Facets for every categorical column, values trimmed, de-duplicated and sorted.
pub fn filter_options<R: Borrow<Row>>(rows: &[R]) -> Vec<FilterOptions> {
    let profile = ColumnProfile::detect(rows);
    profile
        .categorical_columns
        .into_iter()
        .map(|column| {
            let values = rows
                .iter()
                .map(|row| row.borrow().text(&column).trim().to_string())
                .filter(|value| !value.is_empty())
                .unique()
                .sorted()
                .collect();
            FilterOptions { column, values }
        })
        .collect()
}
