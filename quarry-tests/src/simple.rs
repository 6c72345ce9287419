use crate::{error_kind, generated_key, recreate_table};
use quarry::{
    AsValue, ColumnDef, ColumnType, Entity, EntityDef, Executor, OrmError, Result, Row,
    RowLabeled, Value, col,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Tag {
    id: Option<i64>,
    label: String,
    weight: Option<i32>,
}

impl Tag {
    fn new(label: &str, weight: Option<i32>) -> Self {
        Self {
            id: None,
            label: label.into(),
            weight,
        }
    }
}

impl Entity for Tag {
    fn describe() -> EntityDef {
        EntityDef::new("tags")
            .column(
                ColumnDef::new("id", ColumnType::Int64)
                    .primary_key()
                    .auto_increment(),
            )
            .column(
                ColumnDef::new("label", ColumnType::Varchar)
                    .max_length(40)
                    .required(),
            )
            .column(ColumnDef::new("weight", ColumnType::Int32).nullable())
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.label.clone().as_value(),
            self.weight.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            label: row.read("label")?,
            weight: row.read("weight")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "label" => self.label = AsValue::try_from_value(value)?,
            "weight" => self.weight = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

pub async fn simple<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    let key = format!("id {}", generated_key::<E>());
    recreate_table(
        executor,
        "tags",
        &[
            key.as_str(),
            "label VARCHAR(40) NOT NULL UNIQUE",
            "weight INTEGER",
        ],
    )
    .await
    .expect("Failed to create the tags table");

    // Create
    let mut rust = Tag::new("rust", Some(10));
    rust.create(executor).await.expect("Failed to create rust");
    let mut sql = Tag::new("sql", None);
    sql.create(executor).await.expect("Failed to create sql");
    let (Some(rust_id), Some(sql_id)) = (rust.id, sql.id) else {
        panic!("Generated keys were not read back: {rust:?} {sql:?}");
    };
    assert_ne!(rust_id, sql_id);
    assert_eq!(Tag::count(executor).await.expect("Failed to count"), 2);

    // Find
    let found = Tag::find(executor, rust_id)
        .await
        .expect("Failed to find rust")
        .expect("rust is missing");
    assert_eq!(found, rust);
    assert_eq!(
        Tag::find(executor, rust_id + sql_id + 100)
            .await
            .expect("Failed to look for a missing tag"),
        None
    );

    // Update
    sql.weight = Some(3);
    sql.label = "sql92".into();
    sql.update(executor).await.expect("Failed to update sql");
    let found = Tag::find(executor, sql_id)
        .await
        .expect("Failed to find sql")
        .expect("sql is missing");
    assert_eq!(found.label, "sql92");
    assert_eq!(found.weight, Some(3));

    // Query
    Tag::new("serde", Some(7))
        .create(executor)
        .await
        .expect("Failed to create serde");
    let labels: Vec<String> = Tag::query()
        .where_(col("label").starts_with("s"))
        .order_by(col("label").asc())
        .fetch_all(executor)
        .await
        .expect("Failed to query the tags")
        .into_iter()
        .map(|v| v.label)
        .collect();
    assert_eq!(labels, ["serde", "sql92"]);
    let heavy = Tag::query()
        .where_(col("weight").gt(5))
        .order_by(col("weight").desc())
        .fetch_all(executor)
        .await
        .expect("Failed to query the heavy tags");
    assert_eq!(
        heavy.iter().map(|v| v.label.as_str()).collect::<Vec<_>>(),
        ["rust", "serde"]
    );
    let unweighted = Tag::query()
        .where_(col("weight").eq(Value::Int32(None)))
        .count(executor)
        .await
        .expect("Failed to count the unweighted tags");
    assert_eq!(unweighted, 0);
    let second = Tag::query()
        .order_by(col("label").asc())
        .skip(1)
        .first(executor)
        .await
        .expect("Failed to fetch the second tag")
        .expect("There is a second tag");
    assert_eq!(second.label, "serde");

    // Upsert
    let mut renamed = Tag {
        id: Some(rust_id),
        label: "rustlang".into(),
        weight: None,
    };
    renamed.upsert(executor).await.expect("Failed to upsert rust");
    let found = Tag::find(executor, rust_id)
        .await
        .expect("Failed to find rust")
        .expect("rust is missing");
    assert_eq!(found, renamed);
    let mut fresh = Tag::new("tokio", Some(1));
    fresh.upsert(executor).await.expect("Failed to upsert tokio");
    assert!(fresh.id.is_some(), "The upsert did not read back the key");
    assert_eq!(Tag::count(executor).await.expect("Failed to count"), 4);

    // Delete
    sql.delete(executor).await.expect("Failed to delete sql");
    assert_eq!(Tag::count(executor).await.expect("Failed to count"), 3);
    let error = sql
        .delete(executor)
        .await
        .expect_err("Deleting twice must fail");
    assert!(matches!(error_kind(&error), OrmError::NotFound { .. }));
    let error = sql
        .update(executor)
        .await
        .expect_err("Updating a deleted row must fail");
    assert!(matches!(error_kind(&error), OrmError::NotFound { .. }));

    // Missing key
    let error = Tag::new("nameless", None)
        .update(executor)
        .await
        .expect_err("Updating without a key must fail");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));

    // Upsert on a unique key
    let mut reweighted = Tag::new("serde", Some(70));
    reweighted
        .upsert_on(executor, &["label"])
        .await
        .expect("Failed to upsert serde by label");
    let serde = Tag::query()
        .where_(col("label").eq("serde"))
        .first(executor)
        .await
        .expect("Failed to find serde")
        .expect("serde is missing");
    assert_eq!(serde.weight, Some(70));
    assert_eq!(reweighted.id, serde.id, "The existing key is read back");
    assert_eq!(Tag::count(executor).await.expect("Failed to count"), 3);
    let mut axum = Tag::new("axum", None);
    axum.upsert_on(executor, &["label"])
        .await
        .expect("Failed to upsert axum by label");
    assert!(axum.id.is_some(), "The generated key is read back");
    assert_eq!(Tag::count(executor).await.expect("Failed to count"), 4);
    let error = Tag::new("bogus", None)
        .upsert_on(executor, &["colour"])
        .await
        .expect_err("Unknown conflict columns must be rejected");
    assert!(matches!(error_kind(&error), OrmError::InvalidOperation(..)));
}
