//! Column role inference.
//!
//! Roles are never stored; they are recomputed from a small sample every time
//! a caller needs them. The rules, applied per column in schema order:
//!
//! - the first column whose name contains `date` is the dataset's Date column;
//! - a column is Numeric when a strict majority of its non-empty sampled values
//!   are numbers (or parse as finite floats after trimming);
//! - address-like columns are neither filterable nor categorical;
//! - everything else is Categorical.

use std::{borrow::Borrow, fmt};

use serde::Serialize;

use crate::value::{Row, Value, schema_columns};

/// Rows inspected when deciding whether a column is numeric.
pub const SAMPLE_ROWS: usize = 10;

const DATE_NAME_TOKEN: &str = "date";
const ADDRESS_NAME_TOKENS: &[&str] = &["address", "adress"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Numeric,
    Categorical,
    Date,
    Unknown,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Numeric => "numeric",
            ColumnRole::Categorical => "categorical",
            ColumnRole::Date => "date",
            ColumnRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
struct NumericCandidate {
    non_empty: usize,
    numeric_matches: usize,
}

impl NumericCandidate {
    fn update(&mut self, value: Option<&Value>) {
        let Some(value) = value else {
            return;
        };
        if value.is_empty() {
            return;
        }
        self.non_empty += 1;
        if value.as_number().is_some() {
            self.numeric_matches += 1;
        }
    }

    fn majority(&self) -> bool {
        self.numeric_matches > 0 && self.numeric_matches * 2 > self.non_empty
    }
}

pub fn is_date_name(column: &str) -> bool {
    column.to_ascii_lowercase().contains(DATE_NAME_TOKEN)
}

pub fn is_address_name(column: &str) -> bool {
    let lowered = column.to_ascii_lowercase();
    ADDRESS_NAME_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

/// First column (schema order) whose name marks it as a date.
pub fn find_date_column<R: Borrow<Row>>(rows: &[R]) -> Option<String> {
    schema_columns(rows)
        .into_iter()
        .find(|column| is_date_name(column))
}

pub fn is_numeric_column<R: Borrow<Row>>(rows: &[R], column: &str) -> bool {
    let mut candidate = NumericCandidate::default();
    for row in rows.iter().take(SAMPLE_ROWS) {
        candidate.update(row.borrow().get(column));
    }
    candidate.majority()
}

pub fn classify_column<R: Borrow<Row>>(rows: &[R], column: &str) -> ColumnRole {
    let schema = schema_columns(rows);
    if !schema.iter().any(|name| name == column) {
        return ColumnRole::Unknown;
    }
    let date_column = schema.iter().find(|name| is_date_name(name));
    role_for(rows, column, date_column.map(String::as_str))
}

fn role_for<R: Borrow<Row>>(rows: &[R], column: &str, date_column: Option<&str>) -> ColumnRole {
    if date_column == Some(column) {
        ColumnRole::Date
    } else if is_numeric_column(rows, column) {
        ColumnRole::Numeric
    } else if is_address_name(column) {
        ColumnRole::Unknown
    } else {
        ColumnRole::Categorical
    }
}

/// Roles for every column of a row-set, each list in schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub columns: Vec<(String, ColumnRole)>,
    pub date_column: Option<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub unknown_columns: Vec<String>,
}

impl ColumnProfile {
    pub fn detect<R: Borrow<Row>>(rows: &[R]) -> Self {
        let schema = schema_columns(rows);
        let date_column = schema.iter().find(|name| is_date_name(name)).cloned();
        let mut profile = ColumnProfile {
            date_column: date_column.clone(),
            ..ColumnProfile::default()
        };
        for column in schema {
            let role = role_for(rows, &column, date_column.as_deref());
            match role {
                ColumnRole::Numeric => profile.numeric_columns.push(column.clone()),
                ColumnRole::Categorical => profile.categorical_columns.push(column.clone()),
                ColumnRole::Unknown => profile.unknown_columns.push(column.clone()),
                ColumnRole::Date => {}
            }
            profile.columns.push((column, role));
        }
        profile
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn role_of(&self, column: &str) -> ColumnRole {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| *role)
            .unwrap_or(ColumnRole::Unknown)
    }
}
