//! Dataset identity: semantic type from the dataset name, and stable colours.

use std::{collections::HashMap, fmt};

use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    PosFom,
    PosLfom,
    Lfom,
    Fom,
    MdaClaim,
    Stock,
    Production,
    None,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::PosFom => "pos_fom",
            DatasetType::PosLfom => "pos_lfom",
            DatasetType::Lfom => "lfom",
            DatasetType::Fom => "fom",
            DatasetType::MdaClaim => "mda_claim",
            DatasetType::Stock => "stock",
            DatasetType::Production => "production",
            DatasetType::None => "none",
        }
    }

    /// Fixed display colour for recognized types.
    pub fn color(&self) -> Option<&'static str> {
        match self {
            DatasetType::PosFom => Some("#2563eb"),
            DatasetType::PosLfom => Some("#7c3aed"),
            DatasetType::Lfom => Some("#16a34a"),
            DatasetType::Fom => Some("#ea580c"),
            DatasetType::MdaClaim => Some("#dc2626"),
            DatasetType::Stock => Some("#0891b2"),
            DatasetType::Production => Some("#ca8a04"),
            DatasetType::None => None,
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most specific combination first: `POS FOM` must not fall through to
/// `FOM`, and `LFOM` must be tested before the `FOM` it contains.
const TYPE_RULES: &[(fn(&str) -> bool, DatasetType)] = &[
    (
        |n| n.contains("pos") && n.contains("fom") && !n.contains("lfom"),
        DatasetType::PosFom,
    ),
    (|n| n.contains("pos") && n.contains("lfom"), DatasetType::PosLfom),
    (|n| n.contains("lfom"), DatasetType::Lfom),
    (|n| n.contains("fom"), DatasetType::Fom),
    (|n| n.contains("mda") && n.contains("claim"), DatasetType::MdaClaim),
    (|n| n.contains("stock") || n.contains("inventory"), DatasetType::Stock),
    (|n| n.contains("production"), DatasetType::Production),
];

pub fn classify_dataset_type(name: &str) -> DatasetType {
    let lowered = name.to_ascii_lowercase();
    TYPE_RULES
        .iter()
        .find(|(matches, _)| matches(&lowered))
        .map(|(_, ty)| *ty)
        .unwrap_or(DatasetType::None)
}

pub const FALLBACK_PALETTE: &[&str] = &[
    "#6366f1", "#14b8a6", "#f59e0b", "#ec4899", "#84cc16", "#8b5cf6", "#06b6d4", "#f97316",
    "#10b981", "#e11d48",
];

/// Per-session colour memo. A name keeps the colour it was first given until
/// [`ColorRegistry::reset`]; the fallback index only moves for new names that
/// have no type colour.
#[derive(Debug, Clone, Default)]
pub struct ColorRegistry {
    assigned: HashMap<String, &'static str>,
    next_fallback: usize,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, name: &str) -> &'static str {
        if let Some(color) = self.peek(name) {
            return color;
        }
        let dataset_type = classify_dataset_type(name);
        let color = match dataset_type.color() {
            Some(color) => color,
            None => {
                let color = FALLBACK_PALETTE[self.next_fallback % FALLBACK_PALETTE.len()];
                self.next_fallback += 1;
                color
            }
        };
        debug!("Assigned colour {color} to dataset '{name}' ({dataset_type})");
        self.assigned.insert(name.to_string(), color);
        color
    }

    /// Colour already assigned to `name`, without assigning one.
    pub fn peek(&self, name: &str) -> Option<&'static str> {
        self.assigned.get(name).copied()
    }

    pub fn fallback_index(&self) -> usize {
        self.next_fallback
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn reset(&mut self) {
        self.assigned.clear();
        self.next_fallback = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_rules_apply_in_priority_order() {
        assert_eq!(classify_dataset_type("POS FOM Sales"), DatasetType::PosFom);
        assert_eq!(classify_dataset_type("pos_lfom_2024"), DatasetType::PosLfom);
        assert_eq!(classify_dataset_type("LFOM Sales"), DatasetType::Lfom);
        assert_eq!(classify_dataset_type("FOM Sales"), DatasetType::Fom);
        assert_eq!(classify_dataset_type("MDA Claim Register"), DatasetType::MdaClaim);
        assert_eq!(classify_dataset_type("Inventory Q1"), DatasetType::Stock);
        assert_eq!(classify_dataset_type("Production Log"), DatasetType::Production);
        assert_eq!(classify_dataset_type("Customers"), DatasetType::None);
    }

    #[test]
    fn repeated_names_keep_their_colour() {
        let mut registry = ColorRegistry::new();
        let first = registry.color_for("FOM Sales");
        let lfom = registry.color_for("LFOM Sales");
        let index = registry.fallback_index();
        assert_eq!(registry.color_for("FOM Sales"), first);
        assert_ne!(first, lfom);
        assert_eq!(registry.fallback_index(), index);
    }

    #[test]
    fn fallback_index_moves_only_for_new_names() {
        let mut registry = ColorRegistry::new();
        let a = registry.color_for("Customers");
        let b = registry.color_for("Suppliers");
        assert_eq!(registry.color_for("Customers"), a);
        assert_eq!(registry.fallback_index(), 2);
        assert_eq!(a, FALLBACK_PALETTE[0]);
        assert_eq!(b, FALLBACK_PALETTE[1]);
    }

    #[test]
    fn fallback_palette_wraps_around() {
        let mut registry = ColorRegistry::new();
        for idx in 0..FALLBACK_PALETTE.len() {
            registry.color_for(&format!("dataset {idx}"));
        }
        assert_eq!(registry.color_for("one more"), FALLBACK_PALETTE[0]);
    }

    #[test]
    fn reset_forgets_assignments() {
        let mut registry = ColorRegistry::new();
        registry.color_for("Customers");
        registry.color_for("Suppliers");
        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.peek("Suppliers"), None);
        assert_eq!(registry.color_for("Suppliers"), FALLBACK_PALETTE[0]);
    }
}
