//! JSON projection example
//!
//! This example fetches several result sets in one call and prints them as
//! JSON, showing how each value type is rendered.
//!
//! Run with: cargo run --example json_projection

use rust_data_repository::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Rust Data Repository - JSON Projection Example ===\n");

    let repo = SqliteRepository::connect(RepositoryConfig::new(":memory:")).await?;

    let readings = QueryPattern::new(
        "INSERT INTO readings (point, taken, value, raw) VALUES (@point, @taken, @value, @raw)",
    )?
    .with_parameter_sets(vec![
        Parameters::new()
            .with("@point", "P1")
            .with("@taken", chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default())
            .with("@value", 12.5)
            .with("@raw", vec![0xde_u8, 0xad, 0xbe, 0xef]),
        Parameters::new()
            .with("@point", "P2")
            .with("@taken", DatabaseValue::Null)
            .with("@value", DatabaseValue::Null)
            .with("@raw", DatabaseValue::Null),
    ]);
    repo.save_changes(&[
        QueryPattern::new("CREATE TABLE readings (point TEXT, taken TEXT, value REAL, raw BLOB)")?,
        readings,
    ])
    .await?;

    println!("1. One table, compact:");
    let table = repo
        .fetch_table("SELECT point, taken, value, raw FROM readings ORDER BY point", None)
        .await?;
    println!("{}\n", table.to_json()?);

    println!("2. Duplicate column names are made unique:");
    let table = repo
        .fetch_table("SELECT point, value, point FROM readings WHERE point = 'P1'", None)
        .await?;
    println!("{}\n", table.to_json()?);

    println!("3. Several result sets, indented and keyed by table name:");
    let mut tables = repo
        .fetch_multi_table(
            "SELECT point, value FROM readings WHERE value > @min;
             SELECT COUNT(*) AS total FROM readings;
             SELECT point FROM readings WHERE value IS NULL",
            Some(&Parameters::new().with("@min", 10)),
        )
        .await?;
    tables.rename("Table", "high")?;
    println!("{}", tables.to_json()?);

    println!("\n=== Example completed successfully ===");
    Ok(())
}
