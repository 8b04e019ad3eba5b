//! Ordered keyword rules for picking a dataset's "primary" columns.
//!
//! Each [`RuleSet`] is evaluated top to bottom; the first rule that matches any
//! candidate wins, and candidates are scanned in schema order within a rule.

use log::debug;

use ColumnPredicate::{First, NameContains};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPredicate {
    /// Case-insensitive substring match on the column name.
    NameContains(&'static str),
    /// Matches the first candidate unconditionally.
    First,
}

impl ColumnPredicate {
    pub fn matches(&self, column: &str) -> bool {
        match self {
            ColumnPredicate::NameContains(keyword) => column.to_ascii_lowercase().contains(keyword),
            ColumnPredicate::First => true,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ColumnPredicate::NameContains(keyword) => keyword,
            ColumnPredicate::First => "first candidate",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    pub name: &'static str,
    pub rules: &'static [ColumnPredicate],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'a> {
    pub column: &'a str,
    pub rule: ColumnPredicate,
}

/// Value column for time series charts.
pub const TIME_SERIES_VALUE: RuleSet = RuleSet {
    name: "time-series value",
    rules: &[
        NameContains("price"),
        NameContains("revenue"),
        NameContains("amount"),
        NameContains("quantity"),
        NameContains("value"),
        First,
    ],
};

/// Value column for KPI totals.
pub const KPI_VALUE: RuleSet = RuleSet {
    name: "kpi value",
    rules: &[
        NameContains("price"),
        NameContains("revenue"),
        NameContains("amount"),
        NameContains("quantity"),
        First,
    ],
};

/// Category column for KPI cardinality and default category charts.
pub const KPI_CATEGORY: RuleSet = RuleSet {
    name: "kpi category",
    rules: &[
        NameContains("name"),
        NameContains("product"),
        NameContains("category"),
        First,
    ],
};

impl RuleSet {
    pub fn select<'a, S: AsRef<str>>(&self, candidates: &'a [S]) -> Option<Selection<'a>> {
        let selection = self.rules.iter().find_map(|rule| {
            candidates
                .iter()
                .map(AsRef::as_ref)
                .find(|column| rule.matches(column))
                .map(|column| Selection {
                    column,
                    rule: *rule,
                })
        });
        if let Some(found) = &selection {
            debug!(
                "{} column '{}' chosen by rule '{}'",
                self.name,
                found.column,
                found.rule.describe()
            );
        }
        selection
    }

    pub fn select_column<'a, S: AsRef<str>>(&self, candidates: &'a [S]) -> Option<&'a str> {
        self.select(candidates).map(|selection| selection.column)
    }
}
