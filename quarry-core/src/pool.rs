use crate::{
    Connection, Executor, OrmError, Query, QueryResult, Result,
    stream::{Stream, StreamExt},
};
use anyhow::Context;
use async_stream::try_stream;
use std::{
    borrow::Cow,
    ops::{Deref, DerefMut},
    pin::pin,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::{Url, form_urlencoded};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPoolOptions {
    /// Idle connections kept open regardless of `idle_timeout`.
    pub min_pool_size: usize,
    pub max_pool_size: usize,
    /// Longest wait for a free connection.
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    /// Ping reused connections before handing them out.
    pub validate_connections: bool,
}

impl Default for ConnectionPoolOptions {
    fn default() -> Self {
        Self {
            min_pool_size: 0,
            max_pool_size: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            validate_connections: false,
        }
    }
}

const POOL_KEYS: [&str; 5] = [
    "min_pool_size",
    "max_pool_size",
    "connection_timeout",
    "idle_timeout",
    "validate_connections",
];

impl ConnectionPoolOptions {
    /// Read the options from the query parameters of the URL, timeouts in seconds.
    pub fn from_url(url: &Url) -> Result<Self> {
        Self::from_pairs(url.query_pairs())
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Result<Self> {
        let mut result = Self::default();
        for (key, value) in pairs {
            let context = || format!("Invalid value `{value}` for the pool option `{key}`");
            match key.as_ref() {
                "min_pool_size" => result.min_pool_size = value.parse().with_context(context)?,
                "max_pool_size" => result.max_pool_size = value.parse().with_context(context)?,
                "connection_timeout" => {
                    result.connection_timeout =
                        Duration::from_secs(value.parse().with_context(context)?)
                }
                "idle_timeout" => {
                    result.idle_timeout = Duration::from_secs(value.parse().with_context(context)?)
                }
                "validate_connections" => {
                    result.validate_connections = value.parse().with_context(context)?
                }
                _ => {}
            }
        }
        if result.max_pool_size == 0 || result.min_pool_size > result.max_pool_size {
            return Err(OrmError::InvalidOperation(format!(
                "invalid pool size range {}..={}",
                result.min_pool_size, result.max_pool_size
            ))
            .into());
        }
        Ok(result)
    }

    /// Split `url` into the driver URL and the pool options carried by its query string.
    pub fn split_url(url: &str) -> Result<(String, Self)> {
        let Some((base, query)) = url.split_once('?') else {
            return Ok((url.to_string(), Self::default()));
        };
        let (pool, driver): (Vec<_>, Vec<_>) = form_urlencoded::parse(query.as_bytes())
            .partition(|(key, _)| POOL_KEYS.contains(&key.as_ref()));
        let options = Self::from_pairs(pool.into_iter())?;
        if driver.is_empty() {
            return Ok((base.to_string(), options));
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(driver)
            .finish();
        Ok((format!("{base}?{query}"), options))
    }
}

struct IdleConnection<C> {
    connection: C,
    since: Instant,
    /// Its last statement failed, validated before being handed out again.
    suspect: bool,
}

struct PoolInner<C: Connection> {
    url: String,
    options: ConnectionPoolOptions,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection<C>>>,
    driver: C::Driver,
}

/// Bounded set of connections to one URL.
///
/// It is an [`Executor`] too: every statement sent to the pool borrows a connection for its
/// own duration and gives it back as soon as the result stream ends.
pub struct Pool<C: Connection> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connection> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connection> Pool<C> {
    /// Open `min_pool_size` connections eagerly.
    pub async fn connect(url: &str, options: ConnectionPoolOptions) -> Result<Self> {
        let mut idle = Vec::with_capacity(options.max_pool_size);
        for _ in 0..options.min_pool_size {
            idle.push(IdleConnection {
                connection: C::connect(url).await?,
                since: Instant::now(),
                suspect: false,
            });
        }
        log::debug!(
            "Pool for {url} ready ({} to {} connections)",
            options.min_pool_size,
            options.max_pool_size
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                url: url.to_string(),
                semaphore: Arc::new(Semaphore::new(options.max_pool_size)),
                idle: Mutex::new(idle),
                options,
                driver: Default::default(),
            }),
        })
    }

    /// Same as [`Pool::connect`], the options are read from the URL query string.
    pub async fn open(url: &str) -> Result<Self> {
        let (url, options) = ConnectionPoolOptions::split_url(url)?;
        Self::connect(&url, options).await
    }

    pub fn options(&self) -> &ConnectionPoolOptions {
        &self.inner.options
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<IdleConnection<C>>> {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop connections idle for longer than `idle_timeout` (oldest first, never going below
    /// `min_pool_size`) and hand out the most recently used one.
    fn take_idle(&self) -> Option<IdleConnection<C>> {
        let mut idle = self.lock_idle();
        let options = &self.inner.options;
        let expired = idle
            .iter()
            .take_while(|v| v.since.elapsed() > options.idle_timeout)
            .count()
            .min(idle.len().saturating_sub(options.min_pool_size));
        if expired > 0 {
            log::debug!("Evicting {expired} idle connections");
            idle.drain(..expired);
        }
        idle.pop()
    }

    /// Wait for a free slot, at most `connection_timeout`.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let timeout = self.inner.options.connection_timeout;
        let permit = match tokio::time::timeout(
            timeout,
            self.inner.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(permit) => permit.context("The pool is closed")?,
            Err(..) => {
                let error = OrmError::Timeout(format!(
                    "no connection available within {timeout:?} (max_pool_size {})",
                    self.inner.options.max_pool_size
                ));
                log::error!("{error}");
                return Err(error.into());
            }
        };
        let mut connection = None;
        while let Some(IdleConnection {
            connection: mut candidate,
            suspect,
            ..
        }) = self.take_idle()
        {
            if (suspect || self.inner.options.validate_connections)
                && let Err(error) = candidate.validate().await
            {
                log::debug!("Discarding a broken pooled connection: {error:#}");
                continue;
            }
            connection = Some(candidate);
            break;
        }
        let connection = match connection {
            Some(connection) => connection,
            None => C::connect(&self.inner.url).await?,
        };
        Ok(PooledConnection {
            connection: Some(connection),
            failed: false,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }
}

impl<C: Connection> Executor for Pool<C> {
    type Driver = C::Driver;

    fn driver(&self) -> &Self::Driver {
        &self.inner.driver
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        let pool = self.clone();
        try_stream! {
            let mut connection = pool.acquire().await?;
            let mut stream = pin!(connection.run(query));
            while let Some(value) = stream.next().await {
                yield value?
            }
        }
    }
}

/// Connection borrowed from a [`Pool`], returned to it on drop.
pub struct PooledConnection<C: Connection> {
    /// Taken only by `drop`.
    connection: Option<C>,
    failed: bool,
    pool: Arc<PoolInner<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;
    fn deref(&self) -> &C {
        self.connection
            .as_ref()
            .expect("Pooled connection used after being returned")
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.connection
            .as_mut()
            .expect("Pooled connection used after being returned")
    }
}

impl<C: Connection> Executor for PooledConnection<C> {
    type Driver = C::Driver;

    fn driver(&self) -> &Self::Driver {
        &self.pool.driver
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        let Self {
            connection, failed, ..
        } = self;
        let connection = connection
            .as_mut()
            .expect("Pooled connection used after being returned");
        connection.run(query).inspect(move |result| {
            if result.is_err() {
                *failed = true;
            }
        })
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(IdleConnection {
                connection,
                since: Instant::now(),
                suspect: self.failed,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_url() {
        let url = Url::parse(
            "postgres://db.local/app?max_pool_size=4&connection_timeout=2&validate_connections=true",
        )
        .unwrap();
        let options = ConnectionPoolOptions::from_url(&url).unwrap();
        assert_eq!(options.max_pool_size, 4);
        assert_eq!(options.min_pool_size, 0);
        assert_eq!(options.connection_timeout, Duration::from_secs(2));
        assert_eq!(options.idle_timeout, Duration::from_secs(600));
        assert!(options.validate_connections);
    }

    #[test]
    fn split_keeps_driver_parameters() {
        let (url, options) =
            ConnectionPoolOptions::split_url("sqlite://shop.db?mode=rwc&min_pool_size=2").unwrap();
        assert_eq!(url, "sqlite://shop.db?mode=rwc");
        assert_eq!(options.min_pool_size, 2);
        let (url, _) =
            ConnectionPoolOptions::split_url("sqlite://:memory:?idle_timeout=5").unwrap();
        assert_eq!(url, "sqlite://:memory:");
        assert!(ConnectionPoolOptions::split_url("sqlite://x.db?max_pool_size=many").is_err());
        assert!(
            ConnectionPoolOptions::split_url("sqlite://x.db?min_pool_size=3&max_pool_size=2")
                .is_err()
        );
    }
}
