use crate::recreate_table;
use quarry::{
    AsValue, ColumnDef, ColumnType, ConflictResolution, Entity, EntityDef, Executor, OrmError,
    Result, Row, RowLabeled, Value, VersionKind,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    id: i64,
    name: String,
    email: String,
    city: String,
    revision: i64,
}

impl Profile {
    fn new(id: i64) -> Self {
        Self {
            id,
            name: "Linus".into(),
            email: "linus@example.com".into(),
            city: "Helsinki".into(),
            revision: 0,
        }
    }
}

impl Entity for Profile {
    fn describe() -> EntityDef {
        EntityDef::new("profiles")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("name", ColumnType::Varchar))
            .column(ColumnDef::new("email", ColumnType::Varchar))
            .column(ColumnDef::new("city", ColumnType::Varchar))
            .column(ColumnDef::new("revision", ColumnType::Int64).version(VersionKind::Integer))
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.name.clone().as_value(),
            self.email.clone().as_value(),
            self.city.clone().as_value(),
            self.revision.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            name: row.read("name")?,
            email: row.read("email")?,
            city: row.read("city")?,
            revision: row.read("revision")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "name" => self.name = AsValue::try_from_value(value)?,
            "email" => self.email = AsValue::try_from_value(value)?,
            "city" => self.city = AsValue::try_from_value(value)?,
            "revision" => self.revision = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Two copies of the same stored profile, the first one already written back with a new name.
async fn diverged<E: Executor>(executor: &mut E, id: i64) -> (Profile, Profile) {
    let mut first = Profile::new(id);
    first.create(executor).await.expect("Failed to create the profile");
    let second = first.clone();
    first.name = "Linus T.".into();
    first.update(executor).await.expect("Failed to rename the profile");
    assert_eq!(first.revision, 2);
    (first, second)
}

async fn stored<E: Executor>(executor: &mut E, id: i64) -> Profile {
    Profile::find(executor, id)
        .await
        .expect("Failed to find the profile")
        .expect("The profile is missing")
}

pub async fn conflicts<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        executor,
        "profiles",
        &[
            "id BIGINT PRIMARY KEY",
            "name VARCHAR(80) NOT NULL",
            "email VARCHAR(120) NOT NULL",
            "city VARCHAR(80) NOT NULL",
            "revision BIGINT NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the profiles table");

    // No resolver
    let (_, mut second) = diverged(executor, 1).await;
    second.email = "torvalds@example.com".into();
    let error = second
        .update(executor)
        .await
        .expect_err("The conflict must be reported");
    assert!(matches!(
        OrmError::kind_of(&error),
        Some(OrmError::OptimisticConcurrency { table, .. }) if table == "profiles"
    ));
    assert_eq!(stored(executor, 1).await.email, "linus@example.com");

    // Client wins
    let (_, mut second) = diverged(executor, 2).await;
    second.email = "torvalds@example.com".into();
    second
        .update_resolving(executor, ConflictResolution::ClientWins)
        .await
        .expect("Client wins must resolve the conflict");
    assert_eq!(second.revision, 3);
    let profile = stored(executor, 2).await;
    assert_eq!(profile, second);
    assert_eq!(profile.name, "Linus");
    assert_eq!(profile.email, "torvalds@example.com");

    // Database wins
    let (first, mut second) = diverged(executor, 3).await;
    second.email = "torvalds@example.com".into();
    second
        .update_resolving(executor, ConflictResolution::DatabaseWins)
        .await
        .expect("Database wins must resolve the conflict");
    assert_eq!(second.name, first.name);
    assert_eq!(second.email, "linus@example.com");
    assert_eq!(second.revision, 3, "The stored row still gets a new version");
    assert_eq!(stored(executor, 3).await, second);

    // Merge: fields differing from the stored row are the client changes
    let (first, mut second) = diverged(executor, 4).await;
    second.name = first.name.clone();
    second.city = "Portland".into();
    second
        .update_resolving(executor, ConflictResolution::MergeChanges)
        .await
        .expect("Merge must resolve the conflict");
    assert_eq!(second.name, "Linus T.");
    assert_eq!(second.city, "Portland");
    assert_eq!(second.email, "linus@example.com");
    assert_eq!(second.revision, 3);
    assert_eq!(stored(executor, 4).await, second);

    // The resolved entity is current again
    second.email = "lt@example.com".into();
    second
        .update(executor)
        .await
        .expect("The merged profile must be up to date");
    assert_eq!(stored(executor, 4).await.revision, 4);
}
