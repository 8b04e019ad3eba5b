//! Multi-dataset workspace.
//!
//! [`Workspace`] owns every loaded [`Dataset`], the active set, the colour
//! registry and the filter state. The combined row-set is derived on each call
//! from the current datasets and active set, so it always reflects the latest
//! mutation.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::{Result, anyhow, bail};
use log::{debug, info};
use serde::Serialize;

use crate::{
    dates::{CenturyRule, DateNormalizer},
    dataset::{Dataset, DatasetId},
    filter::FilterState,
    identity::ColorRegistry,
    value::{Row, Value, schema_columns},
};

const RIGHT_PREFIX: &str = "right_";

/// How [`Workspace::merge_datasets`] combines two datasets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Rows of the left dataset followed by rows of the right one.
    #[default]
    Concatenate,
    /// Left join on a column present in both datasets.
    KeyJoin { key: String },
}

/// One active dataset's rows, for charts drawn per dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSlice<'a> {
    pub dataset_id: DatasetId,
    pub dataset_name: &'a str,
    pub rows: &'a [Row],
    pub color: &'static str,
}

#[derive(Debug, Default)]
pub struct Workspace {
    datasets: Vec<Dataset>,
    active: BTreeSet<DatasetId>,
    colors: ColorRegistry,
    filters: FilterState,
    normalizer: DateNormalizer,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dataset and marks it active.
    pub fn add_dataset(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        rows: Vec<Row>,
    ) -> DatasetId {
        let name = name.into();
        let color = self.colors.color_for(&name);
        let dataset = Dataset::new(name, file_name, rows, color);
        let id = dataset.id();
        info!(
            "Added dataset '{}' ({} row(s), kind {})",
            dataset.name(),
            dataset.row_count(),
            dataset.kind()
        );
        self.datasets.push(dataset);
        self.active.insert(id);
        id
    }

    pub fn remove_dataset(&mut self, id: DatasetId) -> Result<Dataset> {
        let position = self.position(id)?;
        self.active.remove(&id);
        let removed = self.datasets.remove(position);
        debug!("Removed dataset '{}'", removed.name());
        Ok(removed)
    }

    pub fn dataset(&self, id: DatasetId) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| dataset.id() == id)
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| dataset.name() == name)
    }

    pub fn is_active(&self, id: DatasetId) -> bool {
        self.active.contains(&id)
    }

    /// Flips membership in the active set and returns the new state.
    pub fn toggle_active(&mut self, id: DatasetId) -> Result<bool> {
        let now_active = !self.is_active(id);
        self.set_active(id, now_active)?;
        Ok(now_active)
    }

    pub fn set_active(&mut self, id: DatasetId, active: bool) -> Result<()> {
        self.position(id)?;
        if active {
            self.active.insert(id);
        } else {
            self.active.remove(&id);
        }
        Ok(())
    }

    pub fn activate_all(&mut self) {
        self.active = self.datasets.iter().map(Dataset::id).collect();
    }

    pub fn active_datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets
            .iter()
            .filter(|dataset| self.active.contains(&dataset.id()))
    }

    /// Rows of every active dataset, in dataset-list order.
    pub fn combined_rows(&self) -> Vec<&Row> {
        self.active_datasets()
            .flat_map(|dataset| dataset.rows().iter())
            .collect()
    }

    pub fn breakdown(&self) -> Vec<DatasetSlice<'_>> {
        self.active_datasets()
            .map(|dataset| DatasetSlice {
                dataset_id: dataset.id(),
                dataset_name: dataset.name(),
                rows: dataset.rows(),
                color: dataset.color(),
            })
            .collect()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    /// Combined rows narrowed by the current filter state.
    pub fn filtered_rows(&self) -> Vec<&Row> {
        self.filters
            .apply_with(self.combined_rows(), &self.normalizer)
    }

    pub fn date_normalizer(&self) -> &DateNormalizer {
        &self.normalizer
    }

    pub fn set_century_rule(&mut self, century: CenturyRule) {
        self.normalizer = DateNormalizer::new(century);
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut ColorRegistry {
        &mut self.colors
    }

    /// Builds a new dataset from two existing ones. The sources stay in place.
    pub fn merge_datasets(
        &mut self,
        left: DatasetId,
        right: DatasetId,
        name: impl Into<String>,
        strategy: &MergeStrategy,
    ) -> Result<DatasetId> {
        let left_dataset = self
            .dataset(left)
            .ok_or_else(|| anyhow!("Dataset {left} not found"))?;
        let right_dataset = self
            .dataset(right)
            .ok_or_else(|| anyhow!("Dataset {right} not found"))?;
        let rows = match strategy {
            MergeStrategy::Concatenate => concatenate_rows(left_dataset.rows(), right_dataset.rows()),
            MergeStrategy::KeyJoin { key } => {
                join_rows(left_dataset.rows(), right_dataset.rows(), key)?
            }
        };
        let file_name = format!("{}+{}", left_dataset.file_name(), right_dataset.file_name());
        info!(
            "Merged '{}' and '{}' into {} row(s) ({:?})",
            left_dataset.name(),
            right_dataset.name(),
            rows.len(),
            strategy
        );
        Ok(self.add_dataset(name, file_name, rows))
    }

    fn position(&self, id: DatasetId) -> Result<usize> {
        self.datasets
            .iter()
            .position(|dataset| dataset.id() == id)
            .ok_or_else(|| anyhow!("Dataset {id} not found"))
    }
}

pub fn concatenate_rows(left: &[Row], right: &[Row]) -> Vec<Row> {
    left.iter().chain(right.iter()).cloned().collect()
}

/// Left join: every left row is kept; matching right rows contribute their
/// non-key columns, renamed with a `right_` prefix when the name is taken.
pub fn join_rows(left: &[Row], right: &[Row], key: &str) -> Result<Vec<Row>> {
    let left_columns = schema_columns(left);
    let right_columns = schema_columns(right);
    if !left.is_empty() && !left_columns.iter().any(|c| c == key) {
        bail!("Join key '{key}' not found in left dataset");
    }
    if !right.is_empty() && !right_columns.iter().any(|c| c == key) {
        bail!("Join key '{key}' not found in right dataset");
    }
    let output_names = right_output_names(&left_columns, &right_columns, key);

    let mut lookup: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in right {
        if let Some(value) = join_key(row, key) {
            lookup.entry(value).or_default().push(row);
        }
    }

    let mut joined = Vec::with_capacity(left.len());
    let mut matched = 0usize;
    for row in left {
        match join_key(row, key).and_then(|value| lookup.get(&value)) {
            Some(bucket) => {
                for right_row in bucket {
                    matched += 1;
                    let mut combined = row.clone();
                    for (column, output) in &output_names {
                        let value = right_row.get(column).cloned().unwrap_or(Value::Null);
                        combined.insert(output.clone(), value);
                    }
                    joined.push(combined);
                }
            }
            None => {
                let mut combined = row.clone();
                for (_, output) in &output_names {
                    combined.insert(output.clone(), Value::Null);
                }
                joined.push(combined);
            }
        }
    }
    debug!("Key join on '{key}': {matched} matched row(s)");
    Ok(joined)
}

/// Trimmed key text; blank or missing keys never match.
fn join_key(row: &Row, key: &str) -> Option<String> {
    let value = row.text(key).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn right_output_names(
    left_columns: &[String],
    right_columns: &[String],
    key: &str,
) -> Vec<(String, String)> {
    let mut seen: HashSet<String> = left_columns.iter().cloned().collect();
    let mut names = Vec::new();
    for column in right_columns {
        if column == key {
            continue;
        }
        let mut candidate = column.clone();
        let mut counter = 1usize;
        while seen.contains(&candidate) {
            candidate = if counter == 1 {
                format!("{RIGHT_PREFIX}{column}")
            } else {
                format!("{RIGHT_PREFIX}{column}_{counter}")
            };
            counter += 1;
        }
        seen.insert(candidate.clone());
        names.push((column.clone(), candidate));
    }
    names
}
