use crate::{Connection, SqlWriter};

/// Backend entry point: names the connection type and the dialect it speaks.
pub trait Driver: Default + Send + Sync + 'static {
    type Connection: Connection<Driver = Self>;
    type SqlWriter: SqlWriter;

    /// Scheme of the connection URLs, `sqlite` for `sqlite://path.db`.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;
}
