use crate::{error_kind, recreate_table};
use quarry::{
    AsValue, ColumnDef, ColumnType, Connection, ConnectionPoolOptions, Entity, EntityDef, Executor,
    OrmError, Pool, Query, Result, Row, RowLabeled, Value, future::join_all,
};
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    id: i64,
    hits: i64,
}

impl Entity for Counter {
    fn describe() -> EntityDef {
        EntityDef::new("counters")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("hits", ColumnType::Int64))
    }
    fn values(&self) -> Row {
        [self.id.as_value(), self.hits.as_value()].into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            hits: row.read("hits")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "hits" => self.hits = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Pool behaviour against `url`, which must point at storage shared by every connection.
pub async fn pool<C: Connection>(url: &str) {
    let _lock = MUTEX.lock().await;

    let options = ConnectionPoolOptions {
        min_pool_size: 1,
        max_pool_size: 2,
        connection_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let mut pool = Pool::<C>::connect(url, options)
        .await
        .expect("Could not open the pool");
    assert_eq!(pool.idle_count(), 1);

    // Exhaustion
    let first = pool.acquire().await.expect("Failed to acquire the first");
    let second = pool.acquire().await.expect("Failed to acquire the second");
    assert_eq!(pool.idle_count(), 0);
    let error = match pool.acquire().await {
        Ok(..) => panic!("The pool handed out more than max_pool_size connections"),
        Err(error) => error,
    };
    assert!(matches!(error_kind(&error), OrmError::Timeout(..)));
    drop(first);
    assert_eq!(pool.idle_count(), 1);
    let third = pool
        .acquire()
        .await
        .expect("A released connection must be handed out again");
    drop(second);
    drop(third);
    assert_eq!(pool.idle_count(), 2);

    // The pool is an executor
    recreate_table(
        &mut pool,
        "counters",
        &["id BIGINT PRIMARY KEY", "hits BIGINT NOT NULL"],
    )
    .await
    .expect("Failed to create the counters table");
    let mut counter = Counter { id: 1, hits: 0 };
    for _ in 0..5 {
        counter.hits += 1;
        counter
            .upsert(&mut pool)
            .await
            .expect("Failed to upsert the counter");
    }
    let stored = Counter::find(&mut pool, 1)
        .await
        .expect("Failed to find the counter")
        .expect("The counter is missing");
    assert_eq!(stored, counter);
    assert_eq!(pool.idle_count(), 2, "Every statement gives its connection back");

    // Concurrent callers
    let results = join_all((2..8).map(|id| {
        let mut pool = pool.clone();
        async move {
            let mut counter = Counter { id, hits: id };
            counter.upsert(&mut pool).await
        }
    }))
    .await;
    for result in results {
        result.expect("Failed to upsert concurrently");
    }
    assert_eq!(
        Counter::count(&mut pool).await.expect("Failed to count"),
        7
    );
    assert!(pool.idle_count() <= 2);

    // A failed statement does not lose the connection, it is checked before being reused
    let mut connection = pool.acquire().await.expect("Failed to acquire a connection");
    let before = pool.idle_count();
    connection
        .execute(Query::from("SELEC 1;"))
        .await
        .expect_err("A malformed statement must fail");
    drop(connection);
    assert_eq!(pool.idle_count(), before + 1);
    pool.execute(Query::from("SELEC 1;"))
        .await
        .expect_err("A malformed statement must fail through the pool");
    assert_eq!(
        Counter::count(&mut pool)
            .await
            .expect("The pool must recover after a failed statement"),
        7
    );
    assert_eq!(pool.idle_count(), before + 1);

    // Validated connections
    let validated = Pool::<C>::connect(
        url,
        ConnectionPoolOptions {
            validate_connections: true,
            ..Default::default()
        },
    )
    .await
    .expect("Could not open the validated pool");
    for _ in 0..2 {
        let mut connection = validated
            .acquire()
            .await
            .expect("Failed to acquire a validated connection");
        connection
            .validate()
            .await
            .expect("The connection must be usable");
    }
    assert_eq!(validated.idle_count(), 1);
}
