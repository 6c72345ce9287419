mod context;
mod mssql;
mod mysql;
mod postgres;
mod sql_writer;
mod sqlite;

pub use context::*;
pub use mssql::*;
pub use mysql::*;
pub use postgres::*;
pub use sql_writer::*;
pub use sqlite::*;
