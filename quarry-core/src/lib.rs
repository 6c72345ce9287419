mod as_value;
mod column;
mod connection;
mod driver;
mod entity;
mod error;
mod executor;
mod expression;
mod metadata;
mod mutation;
mod plan;
mod pool;
mod query;
mod transaction;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use column::*;
pub use connection::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use executor::*;
pub use expression::*;
pub use metadata::*;
pub use mutation::{
    BatchInsertConfiguration, ConflictResolution, initial_version, merge_values, next_version,
};
pub use plan::*;
pub use pool::*;
pub use query::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::{
    AliasEntry, AliasTable, Fragment, GenericSqlWriter, MsSqlSqlWriter, MySqlSqlWriter,
    PostgresSqlWriter, SqlWriter, SqliteSqlWriter,
};
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
