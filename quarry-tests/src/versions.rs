use crate::{binary_type, error_kind, recreate_table};
use quarry::{
    AsValue, ColumnDef, ColumnType, Entity, EntityDef, Executor, OrmError, Result, Row,
    RowLabeled, Value, VersionKind,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use uuid::Uuid;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: i64,
    owner: String,
    balance: i64,
    version: i32,
}

impl Entity for Account {
    fn describe() -> EntityDef {
        EntityDef::new("accounts")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("owner", ColumnType::Varchar))
            .column(ColumnDef::new("balance", ColumnType::Int64))
            .column(ColumnDef::new("version", ColumnType::Int32).version(VersionKind::Integer))
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.owner.clone().as_value(),
            self.balance.as_value(),
            self.version.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            owner: row.read("owner")?,
            balance: row.read("balance")?,
            version: row.read("version")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "owner" => self.owner = AsValue::try_from_value(value)?,
            "balance" => self.balance = AsValue::try_from_value(value)?,
            "version" => self.version = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Document {
    id: i64,
    body: String,
    stamp: Option<Box<[u8]>>,
}

impl Entity for Document {
    fn describe() -> EntityDef {
        EntityDef::new("documents")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("body", ColumnType::Varchar))
            .column(
                ColumnDef::new("stamp", ColumnType::Blob)
                    .name("row_version")
                    .version(VersionKind::RowVersion),
            )
    }
    fn values(&self) -> Row {
        [
            self.id.as_value(),
            self.body.clone().as_value(),
            self.stamp.clone().as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            id: row.read("id")?,
            body: row.read("body")?,
            stamp: row.read("row_version")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = AsValue::try_from_value(value)?,
            "body" => self.body = AsValue::try_from_value(value)?,
            "row_version" => self.stamp = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Setting {
    key: String,
    value: String,
    token: Option<Uuid>,
}

impl Entity for Setting {
    fn describe() -> EntityDef {
        EntityDef::new("settings")
            .column(ColumnDef::new("key", ColumnType::Varchar).primary_key())
            .column(ColumnDef::new("value", ColumnType::Varchar))
            .column(ColumnDef::new("token", ColumnType::Uuid).version(VersionKind::Guid))
    }
    fn values(&self) -> Row {
        [
            self.key.clone().as_value(),
            self.value.clone().as_value(),
            self.token.as_value(),
        ]
        .into()
    }
    fn from_row(row: &RowLabeled) -> Result<Self> {
        Ok(Self {
            key: row.read("key")?,
            value: row.read("value")?,
            token: row.read("token")?,
        })
    }
    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "key" => self.key = AsValue::try_from_value(value)?,
            "value" => self.value = AsValue::try_from_value(value)?,
            "token" => self.token = AsValue::try_from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

pub async fn versions<E: Executor>(executor: &mut E) {
    let _lock = MUTEX.lock().await;

    // Setup
    recreate_table(
        executor,
        "accounts",
        &[
            "id BIGINT PRIMARY KEY",
            "owner VARCHAR(80) NOT NULL",
            "balance BIGINT NOT NULL",
            "version INTEGER NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the accounts table");
    let stamp = format!("row_version {} NOT NULL", binary_type::<E>());
    recreate_table(
        executor,
        "documents",
        &["id BIGINT PRIMARY KEY", "body TEXT NOT NULL", stamp.as_str()],
    )
    .await
    .expect("Failed to create the documents table");
    recreate_table(
        executor,
        "settings",
        &[
            "\"key\" VARCHAR(40) PRIMARY KEY",
            "\"value\" TEXT NOT NULL",
            "token VARCHAR(36) NOT NULL",
        ],
    )
    .await
    .expect("Failed to create the settings table");

    // Integer versions count the writes
    let mut account = Account {
        id: 1,
        owner: "Grace".into(),
        balance: 0,
        version: 0,
    };
    account.create(executor).await.expect("Failed to create the account");
    assert_eq!(account.version, 1);
    for deposit in 1..10 {
        account.balance += deposit;
        account
            .update(executor)
            .await
            .expect("Failed to update the account");
    }
    assert_eq!(account.version, 10);
    let stored = Account::find(executor, 1)
        .await
        .expect("Failed to find the account")
        .expect("The account is missing");
    assert_eq!(stored, account);
    assert_eq!(stored.balance, 45);

    // Stale copies
    let mut stale = stored.clone();
    account.owner = "Grace H.".into();
    account.update(executor).await.expect("Failed to rename");
    assert_eq!(account.version, 11);
    stale.balance = 1_000_000;
    let error = stale
        .update(executor)
        .await
        .expect_err("A stale update must not succeed");
    assert!(OrmError::is_concurrency_conflict(&error));
    assert!(format!("{error:#}").contains("concurrency conflict"));
    assert_eq!(stale.version, 10, "A failed update must leave the version alone");
    let error = stale
        .delete(executor)
        .await
        .expect_err("A stale delete must not succeed");
    assert!(OrmError::is_concurrency_conflict(&error));
    let stored = Account::find(executor, 1)
        .await
        .expect("Failed to find the account")
        .expect("The account is missing");
    assert_eq!(stored, account);

    // Deleted rows
    account.delete(executor).await.expect("Failed to delete the account");
    let error = account
        .update(executor)
        .await
        .expect_err("Updating a deleted account must fail");
    assert!(matches!(error_kind(&error), OrmError::NotFound { .. }));
    let error = account
        .delete(executor)
        .await
        .expect_err("Deleting twice a versioned row must fail");
    assert!(OrmError::is_concurrency_conflict(&error));

    // Row versions
    let mut document = Document {
        id: 7,
        body: "draft".into(),
        stamp: None,
    };
    document.create(executor).await.expect("Failed to create the document");
    assert_eq!(document.stamp.as_deref(), Some(&[0, 0, 0, 0, 0, 0, 0, 1][..]));
    let stale = document.clone();
    document.body = "final".into();
    document.update(executor).await.expect("Failed to update the document");
    assert_eq!(document.stamp.as_deref(), Some(&[0, 0, 0, 0, 0, 0, 0, 2][..]));
    let error = stale
        .delete(executor)
        .await
        .expect_err("A stale row version must not delete");
    assert!(OrmError::is_concurrency_conflict(&error));
    let stored = Document::find(executor, 7)
        .await
        .expect("Failed to find the document")
        .expect("The document is missing");
    assert_eq!(stored, document);

    // Guid versions
    let mut setting = Setting {
        key: "theme".into(),
        value: "dark".into(),
        token: None,
    };
    setting.create(executor).await.expect("Failed to create the setting");
    let first = setting.token.expect("The token was not assigned");
    setting.value = "light".into();
    setting.update(executor).await.expect("Failed to update the setting");
    let second = setting.token.expect("The token was not assigned");
    assert_ne!(first, second);
    let stored = Setting::find(executor, "theme".to_string())
        .await
        .expect("Failed to find the setting")
        .expect("The setting is missing");
    assert_eq!(stored, setting);
}
