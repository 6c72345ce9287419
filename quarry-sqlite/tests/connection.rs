#[cfg(test)]
mod tests {
    use quarry::{
        Connection, Executor, Pool, Query, QueryResult, RowsAffected, Value,
        stream::TryStreamExt,
    };
    use quarry_sqlite::SqliteConnection;
    use quarry_tests::{init_logs, silent_logs};
    use std::{path::Path, sync::LazyLock};
    use tokio::{fs, sync::Mutex};

    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    async fn memory() -> SqliteConnection {
        SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open an in memory database")
    }

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().await;
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect("Failed to remove test database file");
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        SqliteConnection::connect(&format!("sqlite://{DB_PATH}?mode=rwc"))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        SqliteConnection::connect(&format!("sqlite://{DB_PATH}?mode=ro"))
            .await
            .expect("Could not open the database");
        fs::remove_file(DB_PATH)
            .await
            .expect("Failed to remove existing test database file");
        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{DB_PATH}?mode=ro"))
                    .await
                    .is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                SqliteConnection::connect("postgres://some_value")
                    .await
                    .is_err()
            );
        }
    }

    #[tokio::test]
    async fn statements() {
        init_logs();
        let mut connection = memory().await;
        connection
            .execute(Query::from(
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);",
            ))
            .await
            .expect("Failed to create the table");

        let result = connection
            .execute(Query::new(
                "INSERT INTO notes (body) VALUES (?), (?);",
                vec![Value::Varchar(Some("a".into())), Value::Varchar(Some("b".into()))],
            ))
            .await
            .expect("Failed to insert");
        assert_eq!(
            result,
            RowsAffected {
                rows_affected: 2,
                last_affected_id: Some(2),
            }
        );

        // Returning rows from a mutation
        let rows = connection
            .fetch(Query::new(
                "INSERT INTO notes (body) VALUES (?) RETURNING id;",
                vec![Value::Varchar(Some("c".into()))],
            ))
            .try_collect::<Vec<_>>()
            .await
            .expect("Failed to insert with returning");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].read::<i64>("id").expect("id"), 3);

        // Several statements share the parameters in order
        let results = connection
            .run(Query::new(
                "UPDATE notes SET body = ? WHERE id = ?; SELECT body FROM notes WHERE id = ?;",
                vec![
                    Value::Varchar(Some("changed".into())),
                    Value::Int64(Some(1)),
                    Value::Int64(Some(1)),
                ],
            ))
            .try_collect::<Vec<_>>()
            .await
            .expect("Failed to run two statements");
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            QueryResult::Affected(RowsAffected {
                rows_affected: 1,
                ..
            })
        ));
        match &results[1] {
            QueryResult::Row(row) => {
                assert_eq!(row.read::<String>("body").expect("body"), "changed")
            }
            other => panic!("Expected a row, got {other:?}"),
        }

        // Reused statements are cached and rebound
        for id in 1..=3 {
            let query = Query::new(
                "SELECT body FROM notes WHERE id = ?;",
                vec![Value::Int64(Some(id))],
            )
            .reuse(true);
            let rows = connection
                .fetch(query)
                .try_collect::<Vec<_>>()
                .await
                .expect("Failed to run the cached statement");
            assert_eq!(rows.len(), 1);
        }

        // Parameter count mismatches
        silent_logs! {
            assert!(
                connection
                    .execute(Query::new("DELETE FROM notes WHERE id = ?;", vec![]))
                    .await
                    .is_err(),
                "Missing parameters must be reported"
            );
            assert!(
                connection
                    .execute(Query::new(
                        "DELETE FROM notes WHERE id = ?;",
                        vec![Value::Int64(Some(1)), Value::Int64(Some(2))],
                    ))
                    .await
                    .is_err(),
                "Extra parameters must be reported"
            );
            assert!(
                connection
                    .execute(Query::from("SELEC 1;"))
                    .await
                    .is_err(),
                "Syntax errors must be reported"
            );
        }
    }

    #[tokio::test]
    async fn abort() {
        init_logs();
        let mut connection = memory().await;
        connection
            .execute(Query::from("CREATE TABLE marks (id INTEGER PRIMARY KEY);"))
            .await
            .expect("Failed to create the table");
        connection
            .execute(Query::from("BEGIN; INSERT INTO marks (id) VALUES (1);"))
            .await
            .expect("Failed to start the transaction");
        silent_logs! {
            connection.abort_transaction();
        }
        let rows = connection
            .fetch(Query::from("SELECT id FROM marks;"))
            .try_collect::<Vec<_>>()
            .await
            .expect("Failed to read the table");
        assert!(rows.is_empty(), "The insert must have been rolled back");
        connection
            .validate()
            .await
            .expect("The connection must stay usable");
    }

    #[tokio::test]
    async fn pool_from_url() {
        init_logs();
        let pool =
            Pool::<SqliteConnection>::open("sqlite://:memory:?min_pool_size=2&max_pool_size=3")
                .await
                .expect("Could not open the pool");
        assert_eq!(pool.options().min_pool_size, 2);
        assert_eq!(pool.options().max_pool_size, 3);
        assert_eq!(pool.idle_count(), 2);
        let mut connection = pool.acquire().await.expect("Failed to acquire a connection");
        connection
            .validate()
            .await
            .expect("The pooled connection must be usable");
        assert_eq!(pool.idle_count(), 1);
        drop(connection);
        assert_eq!(pool.idle_count(), 2);
        assert!(
            Pool::<SqliteConnection>::open("sqlite://:memory:?max_pool_size=zero")
                .await
                .is_err()
        );
    }
}
