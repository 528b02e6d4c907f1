use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

// ============================================================================
// ENTITIES
// ============================================================================

/// Material tracked on the dashboard.
///
/// `id` is the stable surrogate key (assigned by the store, immutable),
/// `code` is the human-facing business key (unique, immutable).
/// Only `currentBalance` and `orderPoint` are mutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,

    pub code: String,

    pub description: String,

    #[serde(rename = "type")]
    pub material_type: String,

    #[serde(rename = "currentBalance")]
    pub current_balance: i64,

    #[serde(rename = "orderPoint")]
    pub order_point: i64,
}

/// One month of the in/out movement chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub id: i64,

    /// Unique month label (e.g. "Jan"), immutable
    pub month: String,

    /// Units moved in
    pub revenue: i64,

    /// Units moved out
    pub expenses: i64,
}

/// Summary indicator card shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatCard {
    pub id: i64,

    /// Unique card label, immutable
    pub label: String,

    /// Display value (free text, may be numeric-as-text like "12%")
    pub value: String,

    /// Signed percentage-like delta
    pub change: i64,

    pub trend: Trend,
}

/// Direction badge of a stat card. Set via discrete selection in the UI,
/// so anything outside these three values is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Trend> {
        match s {
            "up" => Some(Trend::Up),
            "down" => Some(Trend::Down),
            "neutral" => Some(Trend::Neutral),
            _ => None,
        }
    }
}

// ============================================================================
// PARTIAL UPDATES (merge-patch bodies)
// ============================================================================

/// Partial update for a material. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct MaterialPatch {
    #[serde(rename = "currentBalance")]
    pub current_balance: Option<i64>,

    #[serde(rename = "orderPoint")]
    pub order_point: Option<i64>,
}

impl MaterialPatch {
    /// Stock quantities are non-negative integers.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.current_balance.is_some_and(|v| v < 0) {
            return Err("currentBalance não pode ser negativo");
        }
        if self.order_point.is_some_and(|v| v < 0) {
            return Err("orderPoint não pode ser negativo");
        }
        Ok(())
    }
}

/// Partial update for a month of the movement chart.
#[derive(Debug, Default, Deserialize)]
pub struct RevenuePatch {
    pub revenue: Option<i64>,

    pub expenses: Option<i64>,
}

impl RevenuePatch {
    /// Moved quantities are non-negative integers.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.revenue.is_some_and(|v| v < 0) {
            return Err("revenue não pode ser negativo");
        }
        if self.expenses.is_some_and(|v| v < 0) {
            return Err("expenses não pode ser negativo");
        }
        Ok(())
    }
}

/// Partial update for a stat card. `change` is signed, `value` is free text.
#[derive(Debug, Default, Deserialize)]
pub struct StatPatch {
    pub value: Option<String>,

    pub change: Option<i64>,

    pub trend: Option<Trend>,
}

// ============================================================================
// SCHEMA SETUP
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS materials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL,
            type TEXT NOT NULL,
            current_balance INTEGER NOT NULL,
            order_point INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS revenue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            month TEXT UNIQUE NOT NULL,
            revenue INTEGER NOT NULL,
            expenses INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT UNIQUE NOT NULL,
            value TEXT NOT NULL,
            change INTEGER NOT NULL,
            trend TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_materials_code ON materials(code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_revenue_month ON revenue(month)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stats_label ON stats(label)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SEED DATA (rows are created out-of-band; the API only reads and updates)
// ============================================================================

/// Seed row for the materials table (CSV import or built-in defaults)
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialSeed {
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Type")]
    pub material_type: String,

    #[serde(rename = "Current_Balance")]
    pub current_balance: i64,

    #[serde(rename = "Order_Point")]
    pub order_point: i64,
}

/// Seed row for the revenue table
#[derive(Debug, Clone)]
pub struct RevenueSeed {
    pub month: String,
    pub revenue: i64,
    pub expenses: i64,
}

/// Seed row for the stats table
#[derive(Debug, Clone)]
pub struct StatSeed {
    pub label: String,
    pub value: String,
    pub change: i64,
    pub trend: Trend,
}

pub fn load_materials_csv(csv_path: &Path) -> Result<Vec<MaterialSeed>> {
    let rdr = csv::Reader::from_path(csv_path).context("Failed to open materials CSV")?;
    read_materials_csv(rdr)
}

fn read_materials_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<MaterialSeed>> {
    let mut seeds = Vec::new();

    for result in rdr.deserialize() {
        let seed: MaterialSeed = result.context("Failed to deserialize material row")?;
        seeds.push(seed);
    }

    Ok(seeds)
}

pub fn default_materials() -> Vec<MaterialSeed> {
    let rows = [
        ("M-102", "Parafuso Sextavado M8", "Fixação", 120, 40),
        ("M-205", "Porca Sextavada M8", "Fixação", 35, 50),
        ("M-310", "Chapa de Aço 2mm", "Matéria-Prima", 18, 10),
        ("M-405", "Arruela de Pressão", "Fixação", 60, 60),
        ("M-512", "Tinta Epóxi Cinza", "Acabamento", 8, 15),
        ("M-618", "Eletrodo 6013", "Consumível", 75, 30),
        ("M-771", "Tubo Quadrado 40x40", "Matéria-Prima", 22, 12),
        ("M-882", "Luva de Proteção", "EPI", 140, 50),
    ];

    rows.iter()
        .map(|(code, description, material_type, balance, point)| MaterialSeed {
            code: code.to_string(),
            description: description.to_string(),
            material_type: material_type.to_string(),
            current_balance: *balance,
            order_point: *point,
        })
        .collect()
}

pub fn default_revenue() -> Vec<RevenueSeed> {
    let rows = [
        ("Jan", 2400, 1800),
        ("Fev", 2800, 2100),
        ("Mar", 3200, 2400),
        ("Abr", 2900, 2600),
        ("Mai", 3500, 2800),
        ("Jun", 3100, 2300),
        ("Jul", 2700, 2500),
        ("Ago", 3300, 2700),
        ("Set", 3600, 2900),
        ("Out", 3400, 3100),
        ("Nov", 3800, 3200),
        ("Dez", 3950, 3400),
    ];

    rows.iter()
        .map(|(month, revenue, expenses)| RevenueSeed {
            month: month.to_string(),
            revenue: *revenue,
            expenses: *expenses,
        })
        .collect()
}

pub fn default_stats() -> Vec<StatSeed> {
    vec![
        StatSeed {
            label: "Revenue Growth".to_string(),
            value: "12%".to_string(),
            change: 12,
            trend: Trend::Up,
        },
        StatSeed {
            label: "Stock Turnover".to_string(),
            value: "4.2x".to_string(),
            change: -3,
            trend: Trend::Down,
        },
        StatSeed {
            label: "Active Materials".to_string(),
            value: "8".to_string(),
            change: 0,
            trend: Trend::Neutral,
        },
        StatSeed {
            label: "Open Orders".to_string(),
            value: "5".to_string(),
            change: 8,
            trend: Trend::Up,
        },
    ]
}

/// Insert materials, skipping rows whose code already exists.
/// Returns the number of rows actually inserted.
pub fn insert_materials(conn: &Connection, seeds: &[MaterialSeed]) -> Result<usize> {
    let mut inserted = 0;

    for seed in seeds {
        let result = conn.execute(
            "INSERT INTO materials (code, description, type, current_balance, order_point)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                seed.code,
                seed.description,
                seed.material_type,
                seed.current_balance,
                seed.order_point,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(inserted)
}

/// Insert revenue months, skipping months that already exist.
pub fn insert_revenue_points(conn: &Connection, seeds: &[RevenueSeed]) -> Result<usize> {
    let mut inserted = 0;

    for seed in seeds {
        let result = conn.execute(
            "INSERT INTO revenue (month, revenue, expenses) VALUES (?1, ?2, ?3)",
            params![seed.month, seed.revenue, seed.expenses],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(inserted)
}

/// Insert stat cards, skipping labels that already exist.
pub fn insert_stats(conn: &Connection, seeds: &[StatSeed]) -> Result<usize> {
    let mut inserted = 0;

    for seed in seeds {
        let result = conn.execute(
            "INSERT INTO stats (label, value, change, trend) VALUES (?1, ?2, ?3, ?4)",
            params![seed.label, seed.value, seed.change, seed.trend.as_str()],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(inserted)
}

// ============================================================================
// READS (full lists in creation order; positions must not jitter)
// ============================================================================

pub fn list_materials(conn: &Connection) -> Result<Vec<Material>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, description, type, current_balance, order_point
         FROM materials
         ORDER BY id ASC",
    )?;

    let materials = stmt
        .query_map([], |row| {
            Ok(Material {
                id: row.get(0)?,
                code: row.get(1)?,
                description: row.get(2)?,
                material_type: row.get(3)?,
                current_balance: row.get(4)?,
                order_point: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(materials)
}

pub fn list_revenue(conn: &Connection) -> Result<Vec<RevenuePoint>> {
    let mut stmt =
        conn.prepare("SELECT id, month, revenue, expenses FROM revenue ORDER BY id ASC")?;

    let points = stmt
        .query_map([], |row| {
            Ok(RevenuePoint {
                id: row.get(0)?,
                month: row.get(1)?,
                revenue: row.get(2)?,
                expenses: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(points)
}

pub fn list_stats(conn: &Connection) -> Result<Vec<StatCard>> {
    let mut stmt =
        conn.prepare("SELECT id, label, value, change, trend FROM stats ORDER BY id ASC")?;

    let stats = stmt
        .query_map([], |row| {
            let trend_str: String = row.get(4)?;
            let trend = Trend::parse(&trend_str).ok_or(rusqlite::Error::InvalidQuery)?;

            Ok(StatCard {
                id: row.get(0)?,
                label: row.get(1)?,
                value: row.get(2)?,
                change: row.get(3)?,
                trend,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stats)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// MERGE-PATCH UPDATES
// ============================================================================

/// Merge-patch a row identified by a unique business key.
///
/// Builds `UPDATE {table} SET col = ?, ... WHERE {key_column} = ?` from the
/// supplied column/value pairs; columns not supplied keep their stored value.
/// Returns whether a row matched the key. With zero supplied fields this is
/// an existence check and the row is left untouched. Strictly
/// update-existing: a miss never creates a row.
fn merge_patch(
    conn: &Connection,
    table: &str,
    key_column: &str,
    key: &str,
    fields: &[(&str, &dyn ToSql)],
) -> Result<bool> {
    if fields.is_empty() {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, key_column),
            params![key],
            |row| row.get(0),
        )?;
        return Ok(count > 0);
    }

    let assignments: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        table,
        assignments.join(", "),
        key_column,
        fields.len() + 1
    );

    let mut values: Vec<&dyn ToSql> = fields.iter().map(|(_, value)| *value).collect();
    values.push(&key);

    let updated = conn.execute(&sql, &values[..])?;
    Ok(updated > 0)
}

fn get_material(conn: &Connection, code: &str) -> Result<Option<Material>> {
    let material = conn
        .query_row(
            "SELECT id, code, description, type, current_balance, order_point
             FROM materials
             WHERE code = ?1",
            params![code],
            |row| {
                Ok(Material {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    description: row.get(2)?,
                    material_type: row.get(3)?,
                    current_balance: row.get(4)?,
                    order_point: row.get(5)?,
                })
            },
        )
        .optional()?;

    Ok(material)
}

fn get_revenue_point(conn: &Connection, month: &str) -> Result<Option<RevenuePoint>> {
    let point = conn
        .query_row(
            "SELECT id, month, revenue, expenses FROM revenue WHERE month = ?1",
            params![month],
            |row| {
                Ok(RevenuePoint {
                    id: row.get(0)?,
                    month: row.get(1)?,
                    revenue: row.get(2)?,
                    expenses: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(point)
}

fn get_stat(conn: &Connection, label: &str) -> Result<Option<StatCard>> {
    let stat = conn
        .query_row(
            "SELECT id, label, value, change, trend FROM stats WHERE label = ?1",
            params![label],
            |row| {
                let trend_str: String = row.get(4)?;
                let trend = Trend::parse(&trend_str).ok_or(rusqlite::Error::InvalidQuery)?;

                Ok(StatCard {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    value: row.get(2)?,
                    change: row.get(3)?,
                    trend,
                })
            },
        )
        .optional()?;

    Ok(stat)
}

/// Overwrite the supplied fields of the material matching `code`.
/// Returns the full post-update row, or `None` when the code is unknown.
pub fn update_material(
    conn: &Connection,
    code: &str,
    patch: &MaterialPatch,
) -> Result<Option<Material>> {
    let mut fields: Vec<(&str, &dyn ToSql)> = Vec::new();
    if let Some(ref balance) = patch.current_balance {
        fields.push(("current_balance", balance));
    }
    if let Some(ref point) = patch.order_point {
        fields.push(("order_point", point));
    }

    if !merge_patch(conn, "materials", "code", code, &fields)? {
        return Ok(None);
    }

    get_material(conn, code)
}

/// Overwrite the supplied fields of the revenue row matching `month`.
pub fn update_revenue(
    conn: &Connection,
    month: &str,
    patch: &RevenuePatch,
) -> Result<Option<RevenuePoint>> {
    let mut fields: Vec<(&str, &dyn ToSql)> = Vec::new();
    if let Some(ref revenue) = patch.revenue {
        fields.push(("revenue", revenue));
    }
    if let Some(ref expenses) = patch.expenses {
        fields.push(("expenses", expenses));
    }

    if !merge_patch(conn, "revenue", "month", month, &fields)? {
        return Ok(None);
    }

    get_revenue_point(conn, month)
}

/// Overwrite the supplied fields of the stat card matching `label`.
pub fn update_stat(conn: &Connection, label: &str, patch: &StatPatch) -> Result<Option<StatCard>> {
    let trend_str = patch.trend.map(|t| t.as_str());

    let mut fields: Vec<(&str, &dyn ToSql)> = Vec::new();
    if let Some(ref value) = patch.value {
        fields.push(("value", value));
    }
    if let Some(ref change) = patch.change {
        fields.push(("change", change));
    }
    if let Some(ref trend) = trend_str {
        fields.push(("trend", trend));
    }

    if !merge_patch(conn, "stats", "label", label, &fields)? {
        return Ok(None);
    }

    get_stat(conn, label)
}
