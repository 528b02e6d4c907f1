// Stock Control System - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod stock;

// Re-export commonly used types
pub use db::{
    count_rows, default_materials, default_revenue, default_stats, insert_materials,
    insert_revenue_points, insert_stats, list_materials, list_revenue, list_stats,
    load_materials_csv, setup_database, update_material, update_revenue, update_stat,
    Material, MaterialPatch, MaterialSeed, RevenuePatch, RevenuePoint, RevenueSeed, StatCard,
    StatPatch, StatSeed, Trend,
};
pub use stock::{filter_materials, reorder_alert_count, reorder_status, ReorderStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
