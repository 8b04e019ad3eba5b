use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    classify::ColumnProfile,
    value::{Row, schema_columns},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DatasetId(Uuid);

impl DatasetId {
    pub fn new() -> Self {
        DatasetId(Uuid::new_v4())
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse business tag detected from a dataset's name and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Sales,
    Production,
    Stock,
    Unknown,
}

const STOCK_TOKENS: &[&str] = &["stock", "inventory", "warehouse", "on_hand", "on hand"];
const PRODUCTION_TOKENS: &[&str] = &["production", "batch", "yield", "output"];
const SALES_TOKENS: &[&str] = &[
    "sales", "sale", "fom", "pos", "order", "invoice", "revenue", "price", "customer",
];

impl DataKind {
    pub fn detect(name: &str, columns: &[String]) -> Self {
        let mut haystack = name.to_ascii_lowercase();
        for column in columns {
            haystack.push(' ');
            haystack.push_str(&column.to_ascii_lowercase());
        }
        let has_any = |tokens: &[&str]| tokens.iter().any(|token| haystack.contains(token));
        if has_any(STOCK_TOKENS) {
            DataKind::Stock
        } else if has_any(PRODUCTION_TOKENS) {
            DataKind::Production
        } else if has_any(SALES_TOKENS) {
            DataKind::Sales
        } else {
            DataKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Sales => "sales",
            DataKind::Production => "production",
            DataKind::Stock => "stock",
            DataKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows from one uploaded source. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    id: DatasetId,
    name: String,
    file_name: String,
    rows: Vec<Row>,
    kind: DataKind,
    columns: Vec<String>,
    color: &'static str,
}

impl Dataset {
    pub(crate) fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        rows: Vec<Row>,
        color: &'static str,
    ) -> Self {
        let name = name.into();
        let columns = schema_columns(&rows);
        let kind = DataKind::detect(&name, &columns);
        Self {
            id: DatasetId::new(),
            name,
            file_name: file_name.into(),
            rows,
            kind,
            columns,
            color,
        }
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn color(&self) -> &'static str {
        self.color
    }

    pub fn profile(&self) -> ColumnProfile {
        ColumnProfile::detect(&self.rows)
    }

    /// Structural problems worth surfacing to the user. None of them stop the
    /// dataset from loading.
    pub fn validation_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rows.is_empty() {
            warnings.push(format!("Dataset '{}' contains no rows", self.name));
            return warnings;
        }
        let profile = self.profile();
        if profile.date_column.is_none() {
            warnings.push(format!(
                "Dataset '{}' has no date column; time series will be empty",
                self.name
            ));
        }
        if profile.numeric_columns.is_empty() {
            warnings.push(format!(
                "Dataset '{}' has no numeric column; totals will be zero",
                self.name
            ));
        }
        let ragged = self
            .rows
            .iter()
            .filter(|row| row.len() != self.columns.len())
            .count();
        if ragged > 0 {
            warnings.push(format!(
                "Dataset '{}' has {ragged} row(s) whose columns differ from the first row",
                self.name
            ));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn data_kind_prefers_stock_then_production_then_sales() {
        let columns = vec!["Product".to_string(), "Price".to_string()];
        assert_eq!(DataKind::detect("FOM Sales", &columns), DataKind::Sales);
        assert_eq!(DataKind::detect("Warehouse", &columns), DataKind::Stock);
        assert_eq!(
            DataKind::detect("Plant A", &["Batch".to_string()]),
            DataKind::Production
        );
        assert_eq!(DataKind::detect("Misc", &["Colour".to_string()]), DataKind::Unknown);
    }

    #[test]
    fn columns_come_from_first_row() {
        let rows = vec![
            [("Date", Value::from("2024-01-01")), ("Qty", Value::from(3.0))]
                .into_iter()
                .collect::<Row>(),
            [("Date", Value::from("2024-01-02"))].into_iter().collect::<Row>(),
        ];
        let dataset = Dataset::new("Orders", "orders.csv", rows, "#000000");
        assert_eq!(dataset.columns(), ["Date", "Qty"]);
        assert_eq!(dataset.row_count(), 2);
        let warnings = dataset.validation_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("1 row(s)"));
    }

    #[test]
    fn empty_dataset_warns_once() {
        let dataset = Dataset::new("Empty", "empty.csv", Vec::new(), "#000000");
        assert_eq!(dataset.validation_warnings().len(), 1);
        assert_eq!(dataset.kind(), DataKind::Unknown);
    }
}
