#[cfg(test)]
mod tests {
    use quarry::Connection;
    use quarry_sqlite::SqliteConnection;
    use quarry_tests::{execute_tests, init_logs, pool};
    use std::{path::Path, sync::LazyLock};
    use tokio::{fs, sync::Mutex};

    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    async fn fresh(path: &str) {
        if Path::new(path).exists() {
            fs::remove_file(path).await.unwrap_or_else(|e| {
                panic!("Failed to remove existing test database file {path}: {e}")
            });
        }
        assert!(
            !Path::new(path).exists(),
            "Database file should not exist before test"
        );
    }

    #[tokio::test]
    async fn sqlite() {
        init_logs();
        const DB_PATH: &str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().await;
        fresh(DB_PATH).await;
        let connection = SqliteConnection::connect(&format!("sqlite://{DB_PATH}?mode=rwc"))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        execute_tests(connection).await;
    }

    #[tokio::test]
    async fn sqlite_pool() {
        init_logs();
        const DB_PATH: &str = "../target/debug/pool.sqlite";
        let _guard = MUTEX.lock().await;
        fresh(DB_PATH).await;
        pool::<SqliteConnection>(&format!("sqlite://{DB_PATH}?mode=rwc")).await;
    }
}
