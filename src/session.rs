//! YAML session files.
//!
//! A session lists the datasets to load, which of them start active, and
//! the filters to apply:
//!
//! ```yaml
//! datasets:
//!   - path: fom_sales.csv
//!     name: FOM Sales
//!   - path: stock.json
//!     active: false
//! filters:
//!   from: 2024-01-01
//!   to: 2024-03-31
//!   select:
//!     Region: [North, South]
//!   drill_down:
//!     Product: Widget
//! century: always_current
//! ```
//!
//! Relative dataset paths resolve against the session file's directory.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    combine::Workspace,
    dates::{CenturyRule, DateNormalizer},
    filter::{FilterState, parse_date_bound_with},
    loader,
};

fn default_active() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub active: bool,
}

impl DatasetEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            active: true,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| loader::display_name_for(&self.path))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub select: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub drill_down: BTreeMap<String, String>,
}

impl FilterConfig {
    /// Layers these settings onto `state`; date bounds given here replace
    /// the state's range.
    pub fn apply_to(&self, state: &mut FilterState) -> Result<()> {
        self.apply_with(state, &DateNormalizer::default())
    }

    /// Like [`FilterConfig::apply_to`], reading date bounds with `normalizer`.
    pub fn apply_with(&self, state: &mut FilterState, normalizer: &DateNormalizer) -> Result<()> {
        if self.from.is_some() || self.to.is_some() {
            let from = self
                .from
                .as_deref()
                .map(|raw| parse_date_bound_with(raw, normalizer))
                .transpose()
                .context("Parsing 'from' filter")?;
            let to = self
                .to
                .as_deref()
                .map(|raw| parse_date_bound_with(raw, normalizer))
                .transpose()
                .context("Parsing 'to' filter")?;
            state.set_date_range(from, to);
        }
        for (column, values) in &self.select {
            state.select_values(column.clone(), values);
        }
        for (column, value) in &self.drill_down {
            state.add_drill_down(column.clone(), value.clone());
        }
        Ok(())
    }

    pub fn to_state(&self) -> Result<FilterState> {
        let mut state = FilterState::new();
        self.apply_to(&mut state)?;
        Ok(state)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub century: Option<CenturyRule>,
}

impl SessionConfig {
    /// Loads a session and resolves its dataset paths against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening session file {path:?}"))?;
        let mut session: SessionConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing session YAML {path:?}"))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        session.resolve_paths(base);
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating session file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing session YAML")
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for entry in &mut self.datasets {
            if entry.path.is_relative() && !loader::is_dash(&entry.path) {
                entry.path = base.join(&entry.path);
            }
        }
    }

    /// Loads every listed dataset into a fresh workspace, applying the
    /// active flags, century rule and filters.
    pub fn build_workspace(
        &self,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Workspace> {
        let mut workspace = Workspace::new();
        if let Some(century) = self.century {
            workspace.set_century_rule(century);
        }
        for entry in &self.datasets {
            let rows = loader::load_dataset_rows(&entry.path, delimiter, encoding)
                .with_context(|| format!("Loading dataset {:?}", entry.path))?;
            let id = workspace.add_dataset(
                entry.display_name(),
                loader::file_name_for(&entry.path),
                rows,
            );
            workspace.set_active(id, entry.active)?;
        }
        let normalizer = *workspace.date_normalizer();
        self.filters.apply_with(workspace.filters_mut(), &normalizer)?;
        info!(
            "Session loaded {} dataset(s), {} active",
            workspace.datasets().len(),
            workspace.active_datasets().count()
        );
        Ok(workspace)
    }
}
