//! Atomic batch example
//!
//! This example demonstrates `save_changes`:
//! - A transfer made of several patterns that commits as a whole
//! - A failing batch that rolls back and names the failing pattern
//! - One pattern executed once per parameter map
//!
//! Run with: cargo run --example transactions

use rust_data_repository::prelude::*;
use tracing_subscriber::EnvFilter;

async fn print_balances(repo: &SqliteRepository) -> Result<()> {
    let table = repo
        .fetch_table("SELECT name, balance FROM accounts ORDER BY id", None)
        .await?;
    println!("   Balances:");
    for row in &table {
        println!(
            "     {:<8} ${:.2}",
            row["name"].as_string(),
            row.get_as::<f64>("balance")?.unwrap_or_default()
        );
    }
    Ok(())
}

fn transfer(from: &str, to: &str, amount: f64) -> Result<Vec<QueryPattern>> {
    Ok(vec![
        build_query_pattern(
            "UPDATE accounts SET balance = balance - @amount WHERE name = @name",
            Parameters::new().with("@name", from).with("@amount", amount),
        )?,
        build_query_pattern(
            "UPDATE accounts SET balance = balance + @amount WHERE name = @name",
            Parameters::new().with("@name", to).with("@amount", amount),
        )?,
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Rust Data Repository - Transactions Example ===\n");

    let repo = SqliteRepository::connect(RepositoryConfig::new(":memory:")).await?;

    println!("1. Creating accounts...");
    let accounts = QueryPattern::new("INSERT INTO accounts (name, balance) VALUES (@name, @balance)")?
        .with_parameter_sets(vec![
            Parameters::new().with("@name", "Alice").with("@balance", 1000.0),
            Parameters::new().with("@name", "Bob").with("@balance", 500.0),
            Parameters::new().with("@name", "Charlie").with("@balance", 250.0),
        ]);
    repo.save_changes(&[
        QueryPattern::new(
            "CREATE TABLE accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                balance REAL NOT NULL CHECK (balance >= 0)
            )",
        )?,
        accounts,
    ])
    .await?;
    println!("   ✓ Accounts created");
    print_balances(&repo).await?;

    println!("\n2. Successful transfer (Alice -> Bob: $100)");
    repo.save_changes(&transfer("Alice", "Bob", 100.0)?).await?;
    println!("   ✓ Committed");
    print_balances(&repo).await?;

    println!("\n3. Failed transfer (Charlie -> Alice: $1000, insufficient funds)");
    match repo.save_changes(&transfer("Charlie", "Alice", 1000.0)?).await {
        Ok(_) => println!("   Unexpected commit"),
        Err(e) => {
            println!("   ✗ Rolled back at pattern #{:?}", e.statement_index());
            println!("     {}", e);
        }
    }
    print_balances(&repo).await?;

    println!("\n4. Several transfers in one batch");
    let mut batch = Vec::new();
    for (from, to, amount) in [("Alice", "Bob", 50.0), ("Bob", "Charlie", 100.0), ("Charlie", "Alice", 25.0)] {
        println!("   - ${:.2} from {} to {}", amount, from, to);
        batch.extend(transfer(from, to, amount)?);
    }
    repo.save_changes(&batch).await?;
    println!("   ✓ All {} patterns committed", batch.len());
    print_balances(&repo).await?;

    println!("\n=== Example completed successfully ===");
    Ok(())
}
