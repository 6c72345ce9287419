use crate::{
    Connection, Driver, Executor, OrmError, Query, QueryResult, Result, SqlWriter,
    stream::Stream,
};
use anyhow::Context;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Open transaction holding its connection exclusively.
///
/// Savepoints nest inside it, and scopes obtained through [`Transaction::scope`] vote on the
/// outcome: a scope dropped without [`TransactionScope::complete`] dooms the transaction, which
/// then rolls back on [`Transaction::commit`] or [`Transaction::complete`]. Dropping an active
/// transaction rolls it back.
pub struct Transaction<'c, C: Connection> {
    connection: &'c mut C,
    state: TransactionState,
    savepoints: Vec<String>,
    counter: usize,
    doomed: bool,
}

impl<'c, C: Connection> Transaction<'c, C> {
    pub async fn begin(connection: &'c mut C) -> Result<Self> {
        let mut sql = String::new();
        connection
            .driver()
            .sql_writer()
            .write_transaction_begin(&mut sql);
        connection.execute(sql.into()).await?;
        Ok(Self {
            connection,
            state: TransactionState::Active,
            savepoints: Vec::new(),
            counter: 0,
            doomed: false,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Active savepoints, innermost last.
    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    /// Whether a scope was disposed without completing.
    pub fn is_doomed(&self) -> bool {
        self.doomed
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(OrmError::InvalidOperation(format!(
                "the transaction is {:?}",
                self.state
            ))
            .into());
        }
        Ok(())
    }

    async fn send(&mut self, sql: String) -> Result<()> {
        if !sql.is_empty() {
            self.connection.execute(sql.into()).await?;
        }
        Ok(())
    }

    /// Commit, unless a scope was disposed without completing: the transaction is then rolled
    /// back and the call fails.
    pub async fn commit(mut self) -> Result<()> {
        self.check_active()?;
        if self.doomed {
            self.rollback().await?;
            return Err(OrmError::InvalidOperation(
                "a transaction scope was disposed without completing, the transaction was rolled back"
                    .into(),
            )
            .into());
        }
        let mut sql = String::new();
        self.connection
            .driver()
            .sql_writer()
            .write_transaction_commit(&mut sql);
        self.send(sql).await?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.check_active()?;
        let mut sql = String::new();
        self.connection
            .driver()
            .sql_writer()
            .write_transaction_rollback(&mut sql);
        self.send(sql).await?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Root vote, same outcome as [`Transaction::commit`].
    pub async fn complete(self) -> Result<()> {
        self.commit().await
    }

    /// Handle sharing this transaction, see [`TransactionScope`].
    pub fn scope(&mut self) -> TransactionScope<'_, 'c, C> {
        TransactionScope {
            transaction: self,
            completed: false,
        }
    }

    /// Create a savepoint, named `sp_<n>` unless a name is given, and return its name.
    pub async fn savepoint(&mut self, name: Option<&str>) -> Result<String> {
        self.check_active()?;
        let name = match name {
            Some(name) => {
                if name.is_empty()
                    || name.starts_with(|c: char| c.is_ascii_digit())
                    || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(OrmError::InvalidOperation(format!(
                        "`{name}` is not a valid savepoint name"
                    ))
                    .into());
                }
                if self.savepoints.iter().any(|v| v == name) {
                    return Err(OrmError::InvalidOperation(format!(
                        "savepoint `{name}` is already active"
                    ))
                    .into());
                }
                name.to_string()
            }
            None => loop {
                self.counter += 1;
                let name = format!("sp_{}", self.counter);
                if !self.savepoints.contains(&name) {
                    break name;
                }
            },
        };
        let mut sql = String::new();
        self.connection
            .driver()
            .sql_writer()
            .write_savepoint(&mut sql, &name);
        self.send(sql).await?;
        self.savepoints.push(name.clone());
        Ok(name)
    }

    fn savepoint_position(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|v| v == name)
            .ok_or_else(|| {
                OrmError::InvalidOperation(format!("savepoint `{name}` is not active")).into()
            })
    }

    /// Release `name` together with the savepoints nested in it.
    pub async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.check_active()?;
        let position = self.savepoint_position(name)?;
        let mut sql = String::new();
        self.connection
            .driver()
            .sql_writer()
            .write_release_savepoint(&mut sql, name);
        self.send(sql).await?;
        self.savepoints.truncate(position);
        Ok(())
    }

    /// Undo the work done after `name`, which stays active.
    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.check_active()?;
        let position = self.savepoint_position(name)?;
        let mut sql = String::new();
        self.connection
            .driver()
            .sql_writer()
            .write_rollback_to_savepoint(&mut sql, name);
        self.send(sql).await?;
        self.savepoints.truncate(position + 1);
        Ok(())
    }

    /// Run `action` inside a fresh savepoint. On error only the savepoint's work is undone and
    /// the error is returned, the transaction stays usable.
    pub async fn execute_with_savepoint<T, F>(&mut self, name: Option<&str>, action: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let name = self.savepoint(name).await?;
        match action(&mut *self).await {
            Ok(value) => {
                self.release_savepoint(&name).await?;
                Ok(value)
            }
            Err(error) => {
                log::debug!("Rolling back to savepoint `{name}`: {error:#}");
                self.rollback_to_savepoint(&name)
                    .await
                    .with_context(|| format!("While recovering from: {error:#}"))?;
                self.release_savepoint(&name).await?;
                Err(error)
            }
        }
    }
}

impl<C: Connection> Executor for Transaction<'_, C> {
    type Driver = C::Driver;

    fn driver(&self) -> &Self::Driver {
        self.connection.driver()
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.connection.run(query)
    }
}

impl<C: Connection> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            log::warn!(
                "Transaction dropped while active on {}, rolling back",
                <C::Driver as Driver>::NAME
            );
            self.connection.abort_transaction();
            self.state = TransactionState::RolledBack;
        }
    }
}

/// Nestable handle sharing one transaction. Call [`TransactionScope::complete`] to vote for
/// the commit; dropping the scope without it forces the whole transaction to roll back.
pub struct TransactionScope<'t, 'c, C: Connection> {
    transaction: &'t mut Transaction<'c, C>,
    completed: bool,
}

impl<'c, C: Connection> TransactionScope<'_, 'c, C> {
    pub fn scope(&mut self) -> TransactionScope<'_, 'c, C> {
        self.transaction.scope()
    }

    pub fn transaction(&mut self) -> &mut Transaction<'c, C> {
        self.transaction
    }

    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl<C: Connection> Executor for TransactionScope<'_, '_, C> {
    type Driver = C::Driver;

    fn driver(&self) -> &Self::Driver {
        self.transaction.driver()
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.transaction.run(query)
    }
}

impl<C: Connection> Drop for TransactionScope<'_, '_, C> {
    fn drop(&mut self) {
        if !self.completed {
            log::warn!("Transaction scope disposed without completing, the transaction is doomed");
            self.transaction.doomed = true;
        }
    }
}
