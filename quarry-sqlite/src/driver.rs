use crate::SqliteConnection;
use quarry_core::{Connection, Driver, Result, SqliteSqlWriter};

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub const fn new() -> Self {
        Self
    }

    /// `sqlite://path/to.db?mode=rwc` or `sqlite://:memory:`
    pub async fn connect(&self, url: &str) -> Result<SqliteConnection> {
        SqliteConnection::connect(url).await
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type SqlWriter = SqliteSqlWriter;

    const NAME: &'static str = "sqlite";

    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter {}
    }
}
