//! Basic repository usage example
//!
//! This example demonstrates the read operations of a repository:
//! - Connecting with a configuration
//! - Seeding a table with a statement batch
//! - Fetching scalars, rows and tables with named parameters
//!
//! Run with: cargo run --example basic_usage
//! Set RUST_LOG=rust_data_repository=debug to see every statement.

use rust_data_repository::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Rust Data Repository - Basic Usage Example ===\n");

    // In-memory databases live inside one connection; the pool keeps exactly one
    println!("1. Connecting to database...");
    let repo = SqliteRepository::connect(RepositoryConfig::new(":memory:")).await?;
    println!("   ✓ Connected ({})\n", repo.database_type());

    println!("2. Creating and seeding table...");
    let seed = QueryPattern::new("INSERT INTO points (name, value, site) VALUES (@name, @value, @site)")?
        .with_parameters([("@name", "P1"), ("@value", "1.5"), ("@site", "north")])
        .with_parameters([("@name", "P2"), ("@value", "2.5"), ("@site", "north")])
        .with_parameters([("@name", "P3"), ("@value", "4.0"), ("@site", "south")]);
    repo.save_changes(&[
        QueryPattern::new(
            "CREATE TABLE points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value REAL,
                site TEXT
            )",
        )?,
        seed,
    ])
    .await?;
    println!("   ✓ 3 points inserted\n");

    println!("3. Scalars...");
    let count: Option<i64> = repo.fetch_scalar("SELECT COUNT(*) FROM points", None).await?;
    println!("   Points: {}", count.unwrap_or(0));
    let missing: Option<String> = repo
        .fetch_scalar("SELECT name FROM points WHERE id = @param1", Some(&build_parameter_map([42])))
        .await?;
    println!("   Point #42: {:?}\n", missing);

    println!("4. Single row...");
    if let Some(row) = repo
        .fetch_row(
            "SELECT name, value FROM points ORDER BY value DESC",
            None,
        )
        .await?
    {
        println!(
            "   Highest: {} = {}",
            row["name"].as_string(),
            row.get_as::<f64>("value")?.unwrap_or_default()
        );
    }
    println!();

    println!("5. Table...");
    let table = repo
        .fetch_table(
            "SELECT id, name, value FROM points WHERE site = @site ORDER BY id",
            Some(&Parameters::new().with("@site", "north")),
        )
        .await?;
    println!("   Columns: {:?}", table.columns());
    for row in &table {
        println!(
            "   {} | {} | {}",
            row["id"].as_string(),
            row["name"].as_string(),
            row["value"].as_string()
        );
    }
    println!();

    println!("6. Error handling...");
    match repo.fetch_table("SELECT * FROM nowhere", None).await {
        Ok(_) => println!("   Unexpected success"),
        Err(e) => println!("   ✓ {}", e),
    }
    match repo
        .fetch_scalar::<i64>("SELECT name FROM points WHERE id = 1", None)
        .await
    {
        Ok(_) => println!("   Unexpected success"),
        Err(e) => println!("   ✓ {}", e),
    }

    println!("\n=== Example completed successfully ===");
    Ok(())
}
