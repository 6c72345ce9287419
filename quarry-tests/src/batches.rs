use crate::recreate_table;
use quarry::{
    AsValue, BatchInsertConfiguration, ColumnDef, ColumnType, Entity, EntityDef, Executor, Query,
    Result, Row, RowLabeled, Value, col,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    id: i64,
    sensor: String,
    value: f64,
}

impl Entity for Reading {
    fn describe() -> EntityDef {
        EntityDef::new("readings")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("sensor", ColumnType::Varchar).max_length(16))
            .column(ColumnDef::new("value", ColumnType::Float64))
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.sensor.clone().as_value(),
            self.value.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            sensor: row.read("sensor")?,
            value: row.read("value")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "sensor" => self.sensor = AsValue::try_from_value(value)?,
            "value" => self.value = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

fn readings(count: i64) -> Vec<Reading> {
    (0..count)
        .map(|i| Reading {
            id: i,
            sensor: format!("s{}", i % 7),
            value: i as f64 * 0.5,
        })
        .collect()
}

async fn clear<E: Executor>(executor: &mut E) {
    executor
        .execute(Query::from("DELETE FROM readings;"))
        .await
        .expect("Failed to clear the readings");
}

pub async fn batches<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        executor,
        "readings",
        &[
            "id BIGINT PRIMARY KEY",
            "sensor VARCHAR(16) NOT NULL",
            "value DOUBLE PRECISION NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the readings table");

    // Every preset stores the same rows with the same values
    for configuration in [
        BatchInsertConfiguration::DEFAULT,
        BatchInsertConfiguration::SMALL_BATCH,
        BatchInsertConfiguration::LARGE_BATCH,
        BatchInsertConfiguration::COMPATIBLE,
    ] {
        clear(executor).await;
        let mut rows = readings(2000);
        let inserted = Reading::create_many(executor, &mut rows, configuration)
            .await
            .unwrap_or_else(|e| panic!("Failed to insert with {configuration:?}: {e:#}"));
        assert_eq!(inserted, 2000);
        assert_eq!(
            Reading::count(executor).await.expect("Failed to count"),
            2000
        );
        let stored = Reading::query()
            .order_by(col("id").asc())
            .fetch_all(executor)
            .await
            .expect("Failed to read the readings back");
        assert!(
            stored == readings(2000),
            "The rows stored with {configuration:?} differ from the inserted ones"
        );
    }

    // One bad row fails its own statement only
    clear(executor).await;
    let mut rows = readings(250);
    rows[150].id = 10;
    let result =
        Reading::create_many(executor, &mut rows, BatchInsertConfiguration::SMALL_BATCH).await;
    assert!(result.is_err(), "The duplicate key must fail the batch");
    assert_eq!(
        Reading::count(executor).await.expect("Failed to count"),
        100,
        "The statement before the failing one stays"
    );

    // Upserts update the existing rows and add the missing ones
    clear(executor).await;
    let mut rows = readings(1000);
    Reading::create_many(executor, &mut rows, BatchInsertConfiguration::DEFAULT)
        .await
        .expect("Failed to insert the readings");
    let mut rows = readings(1500);
    for row in &mut rows {
        row.value = -row.value;
    }
    let written = Reading::upsert_many(executor, &mut rows, BatchInsertConfiguration::DEFAULT)
        .await
        .expect("Failed to upsert the readings");
    assert_eq!(written, 1500);
    assert_eq!(
        Reading::count(executor).await.expect("Failed to count"),
        1500
    );
    let negative = Reading::query()
        .where_(col("value").lt(0))
        .count(executor)
        .await
        .expect("Failed to count the negative readings");
    assert_eq!(negative, 1499);
}
