use crate::{Executor, Query, Result, Transaction};
use std::future::Future;

pub trait Connection: Executor {
    /// Open a connection to a URL whose scheme is the driver name.
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Start a transaction owning this connection until it is committed, rolled back or dropped.
    fn begin(&mut self) -> impl Future<Output = Result<Transaction<'_, Self>>> + Send {
        Transaction::begin(self)
    }

    /// Roll back the open transaction without awaiting, called when a transaction is dropped
    /// while still active.
    fn abort_transaction(&mut self);

    /// Cheap round trip used by the pool to check a reused connection.
    fn validate(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.execute(Query::from("SELECT 1;")).await?;
            Ok(())
        }
    }
}
