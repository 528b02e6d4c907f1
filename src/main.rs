use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::PathBuf;

// Use library instead of local modules
use stock_control::{
    count_rows, default_materials, default_revenue, default_stats, filter_materials,
    insert_materials, insert_revenue_points, insert_stats, list_materials, load_materials_csv,
    reorder_alert_count, reorder_status, setup_database, ReorderStatus,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("seed") => run_seed(args.get(2).map(PathBuf::from))?,
        Some("report") => run_report(args.get(2).map(String::as_str).unwrap_or(""))?,
        _ => print_usage(),
    }

    Ok(())
}

/// Database location: STOCK_DB env var, or ./stock.db
fn db_path() -> PathBuf {
    env::var("STOCK_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("stock.db"))
}

fn print_usage() {
    println!("Stock Control System v{}", stock_control::VERSION);
    println!();
    println!("Usage:");
    println!("  stock-control seed [materials.csv]   Create and seed the database");
    println!("  stock-control report [query]         Stock-level report with reorder alerts");
    println!();
    println!("The database path defaults to ./stock.db (override with STOCK_DB).");
    println!("Start the API server with: cargo run --bin stock-server --features server");
}

fn run_seed(csv_path: Option<PathBuf>) -> Result<()> {
    println!("🗄️  Stock Control - Database Seed");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let materials = match csv_path {
        Some(ref path) => {
            println!("\n📂 Loading materials from {:?}...", path);
            let seeds = load_materials_csv(path)?;
            println!("✓ Loaded {} materials from CSV", seeds.len());
            seeds
        }
        None => default_materials(),
    };

    println!("\n🔧 Setting up database at {:?}...", db_path());
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Inserting seed rows...");
    let inserted_materials = insert_materials(&conn, &materials)?;
    let inserted_revenue = insert_revenue_points(&conn, &default_revenue())?;
    let inserted_stats = insert_stats(&conn, &default_stats())?;

    println!(
        "✓ Materials: {} inserted, {} skipped as duplicates",
        inserted_materials,
        materials.len() - inserted_materials
    );
    println!("✓ Revenue months: {} inserted", inserted_revenue);
    println!("✓ Stat cards: {} inserted", inserted_stats);

    println!("\n🔍 Verifying database...");
    println!("✓ materials: {} rows", count_rows(&conn, "materials")?);
    println!("✓ revenue:   {} rows", count_rows(&conn, "revenue")?);
    println!("✓ stats:     {} rows", count_rows(&conn, "stats")?);

    Ok(())
}

fn run_report(query: &str) -> Result<()> {
    let path = db_path();

    if !path.exists() {
        eprintln!("❌ Database not found at {:?}", path);
        eprintln!("   Run: cargo run seed");
        eprintln!("   to create and seed it first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&path)?;
    let materials = list_materials(&conn)?;
    let filtered = filter_materials(&materials, query);

    println!("📊 Stock Report ({} of {} materials)", filtered.len(), materials.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for material in &filtered {
        let status = reorder_status(material);
        let marker = match status {
            ReorderStatus::NeedsReorder => "⚠️ ",
            ReorderStatus::InStock => "  ",
        };

        println!(
            "{} {:<8} {:<28} balance {:>5}  point {:>5}  [{}]",
            marker,
            material.code,
            material.description,
            material.current_balance,
            material.order_point,
            status.as_str()
        );
    }

    let alerts = reorder_alert_count(&materials);
    if alerts > 0 {
        println!("\n⚠️  {} material(s) at or below the reorder point", alerts);
    } else {
        println!("\n✓ All materials above their reorder points");
    }

    Ok(())
}
