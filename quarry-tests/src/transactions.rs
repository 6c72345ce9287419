use crate::{error_kind, recreate_table};
use quarry::{
    AsValue, ColumnDef, ColumnType, Connection, Entity, EntityDef, Executor, OrmError, Result,
    Row, RowLabeled, TransactionState, Value, col,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: i64,
    note: String,
}

impl Entry {
    fn new(id: i64) -> Self {
        Self {
            id,
            note: format!("entry {id}"),
        }
    }
}

impl Entity for Entry {
    fn describe() -> EntityDef {
        EntityDef::new("journal")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("note", ColumnType::Varchar).max_length(80))
    }
    fn values(&self) -> Row {
        [self.id.as_value(), self.note.clone().as_value()].into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            note: row.read("note")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "note" => self.note = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

async fn stored<E: Executor>(executor: &mut E) -> Vec<i64> {
    Entry::query()
        .order_by(col("id").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to read the journal")
        .into_iter()
        .map(|v| v.id)
        .collect()
}

pub async fn transactions<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        connection,
        "journal",
        &["id BIGINT PRIMARY KEY", "note VARCHAR(80) NOT NULL"],
    )
    .await
    .expect("Failed to create the journal table");

    // Commit
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    Entry::new(1)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 1");
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(stored(connection).await, [1]);

    // Rollback
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    Entry::new(2)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 2");
    transaction
        .rollback()
        .await
        .expect("Failed to roll back the transaction");
    assert_eq!(stored(connection).await, [1]);

    // Dropped while active
    {
        let mut transaction = connection
            .begin()
            .await
            .expect("Could not begin a transaction");
        Entry::new(3)
            .create(&mut transaction)
            .await
            .expect("Failed to create entry 3");
        assert_eq!(transaction.state(), TransactionState::Active);
    }
    assert_eq!(stored(connection).await, [1]);

    // A failing savepoint undoes its own work only
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    Entry::new(4)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 4");
    let result: Result<()> = transaction
        .execute_with_savepoint(None, async |transaction| {
            Entry::new(5).create(transaction).await?;
            Entry::new(4).create(transaction).await?;
            Ok(())
        })
        .await;
    assert!(result.is_err(), "The duplicate key must fail the savepoint");
    assert!(transaction.savepoints().is_empty());
    let depth = transaction
        .execute_with_savepoint(Some("outer"), async |transaction| {
            Entry::new(6).create(transaction).await?;
            let inner: Result<()> = transaction
                .execute_with_savepoint(None, async |transaction| {
                    Entry::new(7).create(transaction).await?;
                    Err(OrmError::InvalidOperation("abandoned".into()).into())
                })
                .await;
            assert!(inner.is_err());
            assert_eq!(transaction.savepoints(), ["outer"]);
            Ok(transaction.savepoints().len())
        })
        .await
        .expect("The outer savepoint must succeed");
    assert_eq!(depth, 1);
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(stored(connection).await, [1, 4, 6]);

    // Manual savepoints
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    let first = transaction
        .savepoint(None)
        .await
        .expect("Failed to create the first savepoint");
    assert_eq!(first, "sp_1");
    Entry::new(8)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 8");
    transaction
        .savepoint(Some("second"))
        .await
        .expect("Failed to create the second savepoint");
    Entry::new(9)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 9");
    let error = transaction
        .savepoint(Some("second"))
        .await
        .expect_err("Savepoint names are unique");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
    let error = transaction
        .savepoint(Some("1; DROP TABLE journal"))
        .await
        .expect_err("Savepoint names are identifiers");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
    transaction
        .rollback_to_savepoint(&first)
        .await
        .expect("Failed to roll back to the first savepoint");
    assert_eq!(transaction.savepoints(), [first.as_str()]);
    Entry::new(10)
        .create(&mut transaction)
        .await
        .expect("Failed to create entry 10");
    transaction
        .release_savepoint(&first)
        .await
        .expect("Failed to release the first savepoint");
    let error = transaction
        .release_savepoint("second")
        .await
        .expect_err("The second savepoint is gone");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(stored(connection).await, [1, 4, 6, 10]);

    // Every scope completes
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    {
        let mut scope = transaction.scope();
        Entry::new(11)
            .create(&mut scope)
            .await
            .expect("Failed to create entry 11");
        {
            let mut inner = scope.scope();
            Entry::new(12)
                .create(&mut inner)
                .await
                .expect("Failed to create entry 12");
            inner.complete();
        }
        scope.complete();
    }
    assert!(!transaction.is_doomed());
    transaction
        .complete()
        .await
        .expect("Failed to complete the transaction");
    assert_eq!(stored(connection).await, [1, 4, 6, 10, 11, 12]);

    // One scope left incomplete rolls everything back
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    {
        let mut scope = transaction.scope();
        Entry::new(13)
            .create(&mut scope)
            .await
            .expect("Failed to create entry 13");
        {
            let mut inner = scope.scope();
            Entry::new(14)
                .create(&mut inner)
                .await
                .expect("Failed to create entry 14");
        }
        scope.complete();
    }
    assert!(transaction.is_doomed());
    let error = transaction
        .complete()
        .await
        .expect_err("A doomed transaction must not commit");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
    assert_eq!(stored(connection).await, [1, 4, 6, 10, 11, 12]);

    // A plain commit honours the scope votes too
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    {
        let mut scope = transaction.scope();
        Entry::new(15)
            .create(&mut scope)
            .await
            .expect("Failed to create entry 15");
    }
    assert!(transaction.is_doomed());
    let error = transaction
        .commit()
        .await
        .expect_err("A doomed transaction must not commit");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
    assert_eq!(stored(connection).await, [1, 4, 6, 10, 11, 12]);
}
