// Stock-level rules shared by every dashboard surface.
// All pure functions over already-fetched material lists. Status is
// derived at display time, never stored, because both inputs are mutable.

use crate::db::Material;

// ============================================================================
// REORDER STATUS
// ============================================================================

/// Derived stock status of a material. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderStatus {
    NeedsReorder,
    InStock,
}

impl ReorderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderStatus::NeedsReorder => "needs-reorder",
            ReorderStatus::InStock => "in-stock",
        }
    }
}

/// A material needs reordering when its balance is at or below the reorder
/// point (inclusive threshold: equality already flags it).
pub fn reorder_status(material: &Material) -> ReorderStatus {
    if material.current_balance <= material.order_point {
        ReorderStatus::NeedsReorder
    } else {
        ReorderStatus::InStock
    }
}

/// Number of at-risk materials, shown as the dashboard alert counter.
pub fn reorder_alert_count(materials: &[Material]) -> usize {
    materials
        .iter()
        .filter(|m| reorder_status(m) == ReorderStatus::NeedsReorder)
        .count()
}

// ============================================================================
// SEARCH FILTER
// ============================================================================

/// Case-insensitive substring match on code OR description.
/// Empty query matches everything. No fuzzy matching, no ranking:
/// input order is preserved unchanged.
pub fn filter_materials<'a>(materials: &'a [Material], query: &str) -> Vec<&'a Material> {
    let query = query.to_lowercase();

    materials
        .iter()
        .filter(|m| {
            m.code.to_lowercase().contains(&query)
                || m.description.to_lowercase().contains(&query)
        })
        .collect()
}
