//! Integration tests for the SQLite repository
//!
//! These tests run every repository operation against a real database file:
//! - Reads: scalars, rows, tables and multiple result sets
//! - JSON projection of fetched results
//! - Atomic batches, including rollback on failure
//! - Concurrent callers sharing one repository

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use rust_data_repository::prelude::*;
    use std::error::Error as _;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> RepositoryConfig {
        RepositoryConfig::new(dir.path().join("points.db").to_string_lossy())
    }

    async fn points_repository(dir: &TempDir) -> SqliteRepository {
        let repo = SqliteRepository::connect(config(dir))
            .await
            .expect("Failed to connect");

        let insert = QueryPattern::new(
            "INSERT INTO points (name, value, site) VALUES (@name, @value, @site)",
        )
        .unwrap()
        .with_parameters([("@name", "P1"), ("@value", "1.5"), ("@site", "north")])
        .with_parameters([("@name", "P2"), ("@value", "2.5"), ("@site", "north")])
        .with_parameters([("@name", "P3"), ("@value", "4"), ("@site", "south")]);

        repo.save_changes(&[
            QueryPattern::new(
                "CREATE TABLE points (id INTEGER PRIMARY KEY, name TEXT NOT NULL, value REAL, site TEXT)",
            )
            .unwrap(),
            insert,
        ])
        .await
        .expect("Failed to seed points");

        repo
    }

    async fn count_points(repo: &SqliteRepository) -> i64 {
        repo.fetch_scalar("SELECT COUNT(*) FROM points", None)
            .await
            .expect("Count failed")
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_fetch_table_by_parameter() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let table = repo
            .fetch_table(
                "SELECT name, value FROM points WHERE site = @site ORDER BY id",
                Some(&Parameters::new().with("@site", "north")),
            )
            .await
            .expect("Query failed");

        assert_eq!(table.columns(), ["name", "value"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0]["name"], DatabaseValue::from("P1"));
        assert_eq!(table.rows()[1]["value"], DatabaseValue::Double(2.5));
    }

    #[tokio::test]
    async fn test_fetch_table_without_rows_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let table = repo
            .fetch_table("SELECT id, name FROM points WHERE site = 'east'", None)
            .await
            .expect("Query failed");

        assert!(table.is_empty());
        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.to_json().unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_fetch_row() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let row = repo
            .fetch_row(
                "SELECT name, site FROM points WHERE value > @min ORDER BY value",
                Some(&Parameters::new().with("@min", 2)),
            )
            .await
            .expect("Query failed")
            .expect("Expected a row");
        assert_eq!(row.get_as::<String>("name").unwrap(), Some("P2".to_string()));

        let none = repo
            .fetch_row("SELECT name FROM points WHERE id = @id", Some(&build_parameter_map([0])))
            .await;
        assert!(matches!(none, Err(DatabaseError::MissingParameter(_))));

        let none = repo
            .fetch_row("SELECT name FROM points WHERE id = @param1", Some(&build_parameter_map([0])))
            .await
            .expect("Query failed");
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_fetch_scalar() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        assert_eq!(count_points(&repo).await, 3);

        let total: Option<f64> = repo
            .fetch_scalar("SELECT SUM(value) FROM points", None)
            .await
            .unwrap();
        assert_eq!(total, Some(8.0));

        let name: Option<String> = repo
            .fetch_scalar("SELECT name FROM points WHERE id = 99", None)
            .await
            .unwrap();
        assert_eq!(name, None);

        let null: Option<i64> = repo.fetch_scalar("SELECT NULL", None).await.unwrap();
        assert_eq!(null, None);

        let err = repo
            .fetch_scalar::<i64>("SELECT name FROM points WHERE id = 1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::TypeConversion { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_columns_are_suffixed() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let table = repo
            .fetch_table("SELECT id, name, id FROM points WHERE id = 1", None)
            .await
            .unwrap();

        assert_eq!(table.columns(), ["id", "name", "id1"]);
        assert_eq!(table.to_json().unwrap(), r#"[{"id":1,"name":"P1","id1":1}]"#);
    }

    #[tokio::test]
    async fn test_invalid_statement_reports_data_access_error() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let err = repo
            .fetch_table("SELECT * FROM missing_table", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DataAccess { ref statement, .. } if statement.contains("missing_table")));
    }

    #[tokio::test]
    async fn test_read_refuses_trailing_statements() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let err = repo
            .fetch_table("SELECT 1 AS one; DELETE FROM points", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DataAccess { ref statement, .. } if statement.contains("DELETE")));
        assert!(matches!(
            err.source().and_then(|e| e.downcast_ref::<DatabaseError>()),
            Some(DatabaseError::UnsupportedOperation(_))
        ));

        // Nothing ran, the trailing delete included
        assert_eq!(count_points(&repo).await, 3);

        // A trailing separator is not a second statement
        let one: Option<i64> = repo.fetch_scalar("SELECT 1;", None).await.unwrap();
        assert_eq!(one, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_multi_table() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let tables = repo
            .fetch_multi_table(
                "SELECT name FROM points WHERE site = @site ORDER BY id; \
                 SELECT COUNT(*) AS n FROM points WHERE site = @site",
                Some(&Parameters::new().with("@site", "south")),
            )
            .await
            .expect("Query failed");

        assert_eq!(tables.names().collect::<Vec<_>>(), vec!["Table", "Table1"]);
        assert_eq!(tables.get("Table").unwrap().row_count(), 1);
        assert_eq!(tables.get("Table1").unwrap().rows()[0]["n"], DatabaseValue::Long(1));

        let json: serde_json::Value = serde_json::from_str(&tables.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "Table": [{ "name": "P3" }], "Table1": [{ "n": 1 }] })
        );
    }

    #[tokio::test]
    async fn test_fetch_multi_table_without_result_sets() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let tables = repo
            .fetch_multi_table("UPDATE points SET value = value WHERE 0", None)
            .await
            .unwrap();

        assert!(tables.is_empty());
        assert_eq!(tables.to_json().unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_json_projection_of_fetched_values() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let table = repo
            .fetch_table("SELECT x'0102' AS b, 1.5 AS v, NULL AS n, 'P1' AS s", None)
            .await
            .unwrap();

        assert_eq!(
            table.to_json().unwrap(),
            r#"[{"b":"AQI=","v":1.5,"n":null,"s":"P1"}]"#
        );
    }

    #[tokio::test]
    async fn test_save_changes_commits_every_execution() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let update = QueryPattern::new("UPDATE points SET value = @value WHERE name = @name")
            .unwrap()
            .with_parameter_sets(vec![
                Parameters::new().with("@name", "P1").with("@value", 10),
                Parameters::new().with("@name", "P2").with("@value", 20),
            ]);
        let delete = build_query_pattern("DELETE FROM points WHERE name = @name", [("@name", "P3")])
            .unwrap();

        assert!(repo.save_changes(&[update, delete]).await.unwrap());

        let total: Option<i64> = repo
            .fetch_scalar("SELECT SUM(value) FROM points", None)
            .await
            .unwrap();
        assert_eq!(total, Some(30));
        assert_eq!(count_points(&repo).await, 2);
    }

    #[tokio::test]
    async fn test_save_changes_runs_every_statement_of_a_pattern() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        assert!(repo
            .save_changes(&[
                QueryPattern::new("CREATE TABLE a (x INTEGER); CREATE TABLE b (x INTEGER)").unwrap(),
                QueryPattern::new("INSERT INTO a VALUES (@x); INSERT INTO b VALUES (@x + 1)")
                    .unwrap()
                    .with_parameters([("@x", 1)]),
            ])
            .await
            .unwrap());

        let b: Option<i64> = repo.fetch_scalar("SELECT x FROM b", None).await.unwrap();
        assert_eq!(b, Some(2));

        // A failing later statement rolls back the earlier ones in the same text
        let err = repo
            .save_changes(&[QueryPattern::new(
                "DELETE FROM points; INSERT INTO points (name) VALUES (NULL)",
            )
            .unwrap()])
            .await
            .unwrap_err();
        assert_eq!(err.statement_index(), Some(0));
        assert_eq!(count_points(&repo).await, 3);
    }

    #[tokio::test]
    async fn test_save_changes_empty_batch() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        assert!(repo.save_changes(&[]).await.unwrap());
        assert_eq!(count_points(&repo).await, 3);
    }

    #[tokio::test]
    async fn test_save_changes_rolls_back_on_failure() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let err = repo
            .save_changes(&[
                QueryPattern::new("INSERT INTO points (name) VALUES ('P4')").unwrap(),
                QueryPattern::new("DELETE FROM points").unwrap(),
                QueryPattern::new("INSERT INTO points (name) VALUES (NULL)").unwrap(),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.statement_index(), Some(2));
        assert!(matches!(err, DatabaseError::StatementExecution { index: 2, .. }));

        // Neither the insert nor the delete survived
        assert_eq!(count_points(&repo).await, 3);
        let names = repo
            .fetch_table("SELECT name FROM points ORDER BY id", None)
            .await
            .unwrap();
        let names: Vec<String> = names
            .rows()
            .iter()
            .map(|row| row.get_as::<String>("name").unwrap().unwrap())
            .collect();
        assert_eq!(names, ["P1", "P2", "P3"]);
    }

    #[tokio::test]
    async fn test_fetch_row_by_name_scenario() {
        let dir = TempDir::new().unwrap();
        let repo = SqliteRepository::connect(config(&dir)).await.unwrap();
        repo.save_changes(&[QueryPattern::new("CREATE TABLE points (name TEXT)").unwrap()])
            .await
            .unwrap();

        let query = "SELECT * FROM points WHERE name = @n LIMIT 1";
        let params = Parameters::new().with("@n", "P1");

        assert!(repo.fetch_row(query, Some(&params)).await.unwrap().is_none());

        repo.save_changes(&[build_query_pattern("INSERT INTO points (name) VALUES (@n)", params.clone()).unwrap()])
            .await
            .unwrap();
        let row = repo.fetch_row(query, Some(&params)).await.unwrap().unwrap();
        assert_eq!(row["name"], DatabaseValue::from("P1"));
    }

    #[tokio::test]
    async fn test_save_changes_two_inserts_scenario() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let first = build_query_pattern("INSERT INTO points (name) VALUES (@name)", [("@name", "P4")]).unwrap();
        let second = build_query_pattern("INSERT INTO points (name) VALUES (@name)", [("@name", "P5")]).unwrap();
        assert!(repo.save_changes(&[first.clone(), second]).await.unwrap());
        assert_eq!(count_points(&repo).await, 5);

        let missing =
            build_query_pattern("INSERT INTO nowhere (name) VALUES (@name)", [("@name", "P6")]).unwrap();
        let err = repo.save_changes(&[first, missing]).await.unwrap_err();
        assert_eq!(err.statement_index(), Some(1));
        assert_eq!(count_points(&repo).await, 5);
    }

    #[tokio::test]
    async fn test_parameter_maps_do_not_leak_between_executions() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        // The second map lacks @site; it must not reuse the first map's value
        let insert = QueryPattern::new("INSERT INTO points (name, site) VALUES (@name, @site)")
            .unwrap()
            .with_parameters([("@name", "P4"), ("@site", "west")])
            .with_parameters([("@name", "P5")]);

        let err = repo.save_changes(&[insert]).await.unwrap_err();
        match err {
            DatabaseError::StatementExecution { index, source, .. } => {
                assert_eq!(index, 0);
                assert!(matches!(*source, DatabaseError::MissingParameter(ref name) if name == "@site"));
            }
            other => panic!("Expected statement error, got {other:?}"),
        }
        assert_eq!(count_points(&repo).await, 3);
    }

    #[tokio::test]
    async fn test_extra_parameters_are_ignored() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let params = Parameters::new().with("@site", "north").with("@unused", 1);
        let table = repo
            .fetch_table("SELECT name FROM points WHERE site = @site", Some(&params))
            .await
            .unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers() {
        let dir = TempDir::new().unwrap();
        let repo = points_repository(&dir).await;

        let mut handles = vec![];
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let insert = build_query_pattern(
                    "INSERT INTO points (name, site) VALUES (@name, 'east')",
                    [("@name", format!("C{}", i))],
                )?;
                repo.save_changes(&[insert]).await?;
                repo.fetch_scalar::<i64>("SELECT COUNT(*) FROM points", None).await
            }));
        }

        for handle in handles {
            let count = handle.await.expect("Task panicked").expect("Operation failed");
            assert!(count.unwrap() >= 4);
        }

        assert_eq!(count_points(&repo).await, 11);
        assert!(repo.driver().stats().size <= repo.config().max_connections);
    }

    #[tokio::test]
    async fn test_in_memory_database_shares_one_connection() {
        let repo = SqliteRepository::connect(RepositoryConfig::new(":memory:"))
            .await
            .unwrap();

        repo.save_changes(&[QueryPattern::new("CREATE TABLE t (a INTEGER)").unwrap()])
            .await
            .unwrap();
        let count: Option<i64> = repo.fetch_scalar("SELECT COUNT(*) FROM t", None).await.unwrap();

        assert_eq!(count, Some(0));
        assert_eq!(repo.driver().stats().max_size, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let err = SqliteRepository::connect(RepositoryConfig::new(":memory:").with_max_connections(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Configuration(_)));
    }

    #[test]
    fn test_blocking_repository() {
        let dir = TempDir::new().unwrap();
        let repo = BlockingRepository::<SqliteRepository>::connect(config(&dir))
            .expect("Failed to connect");

        assert!(repo
            .save_changes(&[
                QueryPattern::new("CREATE TABLE readings (v REAL)").unwrap(),
                QueryPattern::new("INSERT INTO readings (v) VALUES (@v)")
                    .unwrap()
                    .with_parameters([("@v", 0.5)]),
            ])
            .unwrap());

        let v: Option<f64> = repo.fetch_scalar("SELECT v FROM readings", None).unwrap();
        assert_eq!(v, Some(0.5));
        assert_eq!(
            repo.fetch_table("SELECT v FROM readings", None).unwrap().to_json().unwrap(),
            r#"[{"v":0.5}]"#
        );
    }
}
