use crate::{
    CBox, SqliteDriver,
    bind::bind_value,
    error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use async_stream::try_stream;
use libsqlite3_sys::{
    SQLITE_BUSY, SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE,
    SQLITE_OPEN_URI, SQLITE_ROW, sqlite3, sqlite3_bind_parameter_count, sqlite3_busy_timeout,
    sqlite3_changes64, sqlite3_clear_bindings, sqlite3_close, sqlite3_column_count,
    sqlite3_errmsg, sqlite3_exec, sqlite3_finalize, sqlite3_last_insert_rowid, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_reset, sqlite3_step, sqlite3_stmt, sqlite3_stmt_readonly,
};
use quarry_core::{
    Connection, Context, Driver, Error, Executor, Query, QueryResult, Result, Row, RowLabeled,
    RowNames, RowsAffected, stream::Stream, truncate_long,
};
use std::{
    collections::HashMap,
    ffi::{CString, c_char, c_int},
    ptr,
};
use tokio::task::{spawn_blocking, yield_now};

const STATEMENT_CACHE_SIZE: usize = 64;
const BUSY_TIMEOUT_MS: c_int = 5000;

fn finalize(statement: *mut sqlite3_stmt) {
    unsafe {
        sqlite3_finalize(statement);
    }
}

fn close(connection: *mut sqlite3) {
    unsafe {
        sqlite3_close(connection);
    }
}

fn check_parameters(used: usize, provided: usize, sql: &str) -> Result<()> {
    if used == provided {
        return Ok(());
    }
    let error = Error::msg(format!(
        "{provided} parameters were provided but the query uses {used}:\n{}",
        truncate_long!(sql)
    ));
    log::error!("{error}");
    Err(error)
}

pub struct SqliteConnection {
    // Finalized before the connection is closed
    cache: HashMap<String, CBox<sqlite3_stmt>>,
    connection: CBox<sqlite3>,
}

impl SqliteConnection {
    fn last_error(&self) -> Error {
        Error::msg(error_message_from_ptr(&unsafe { sqlite3_errmsg(*self.connection) }).to_string())
    }

    /// Compile the first statement of `sql`, returns it with the number of bytes it consumed.
    /// The statement is null when only whitespace or comments were left.
    async fn prepare(&self, sql: &str) -> Result<(CBox<sqlite3_stmt>, usize)> {
        let connection = self.connection.borrowed();
        let sql = sql.to_string();
        spawn_blocking(move || unsafe {
            let mut statement = CBox::new(ptr::null_mut(), finalize);
            let mut tail = ptr::null();
            let start = sql.as_ptr() as *const c_char;
            let rc = sqlite3_prepare_v2(
                *connection,
                start,
                sql.len() as c_int,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error =
                    Error::msg(error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string())
                        .context(format!(
                            "While preparing the query:\n{}",
                            truncate_long!(sql)
                        ));
                log::error!("{error:#}");
                return Err(error);
            }
            let consumed = if tail.is_null() {
                sql.len()
            } else {
                tail.offset_from(start) as usize
            };
            Ok((statement, consumed))
        })
        .await?
    }

    /// `SQLITE_ROW`, `SQLITE_DONE` or `SQLITE_BUSY`.
    fn step(&self, statement: &CBox<sqlite3_stmt>, sql: &str) -> Result<c_int> {
        match unsafe { sqlite3_step(**statement) } {
            rc @ (SQLITE_ROW | SQLITE_DONE | SQLITE_BUSY) => Ok(rc),
            _ => {
                let error = self.last_error().context(format!(
                    "While executing the query:\n{}",
                    truncate_long!(sql)
                ));
                log::error!("{error:#}");
                Err(error)
            }
        }
    }

    fn cache_statement(&mut self, sql: String, statement: CBox<sqlite3_stmt>) {
        unsafe {
            sqlite3_reset(*statement);
            sqlite3_clear_bindings(*statement);
        }
        if self.cache.len() >= STATEMENT_CACHE_SIZE {
            self.cache.clear();
        }
        self.cache.insert(sql, statement);
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver
    }

    /// Statements are run one after the other, each one takes its parameters from the front
    /// of `query.params`.
    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        try_stream! {
            let Query { sql, params, reuse } = query;
            let mut offset = 0;
            let mut bound = 0;
            while offset < sql.len() {
                let cached = if reuse && offset == 0 {
                    self.cache.remove(&sql)
                } else {
                    None
                };
                let (statement, consumed) = match cached {
                    Some(statement) => (statement, sql.len()),
                    None => self.prepare(&sql[offset..]).await?,
                };
                let single = offset == 0 && consumed == sql.len();
                offset += consumed;
                if statement.is_null() {
                    continue;
                }
                let count = unsafe { sqlite3_bind_parameter_count(*statement) } as usize;
                check_parameters(bound + count, params.len(), &sql)?;
                for (i, value) in params[bound..bound + count].iter().enumerate() {
                    bind_value(*statement, i as c_int + 1, value)?;
                }
                bound += count;
                let columns = unsafe { sqlite3_column_count(*statement) };
                let labels = (0..columns)
                    .map(|i| extract_name(*statement, i))
                    .collect::<Result<RowNames>>()?;
                loop {
                    match self.step(&statement, &sql)? {
                        SQLITE_ROW => {
                            let values = (0..columns)
                                .map(|i| extract_value(*statement, i))
                                .collect::<Result<Row>>()?;
                            yield QueryResult::Row(RowLabeled::new(labels.clone(), values));
                        }
                        SQLITE_DONE => break,
                        _ => yield_now().await,
                    }
                }
                if columns == 0 {
                    let readonly = unsafe { sqlite3_stmt_readonly(*statement) } != 0;
                    yield QueryResult::Affected(if readonly {
                        RowsAffected::default()
                    } else {
                        unsafe {
                            RowsAffected {
                                rows_affected: sqlite3_changes64(*self.connection) as u64,
                                last_affected_id: Some(sqlite3_last_insert_rowid(
                                    *self.connection,
                                )),
                            }
                        }
                    });
                }
                if reuse && single {
                    self.cache_statement(sql.clone(), statement);
                }
            }
            check_parameters(bound, params.len(), &sql)?;
        }
    }
}

impl Connection for SqliteConnection {
    async fn connect(url: &str) -> Result<Self> {
        let prefix = format!("{}://", <Self::Driver as Driver>::NAME);
        let Some(path) = url.strip_prefix(&prefix) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{prefix}`"
            ));
            log::error!("{error}");
            return Err(error);
        };
        let uri = CString::new(format!("file:{path}"))
            .with_context(|| format!("Error while decoding connection URL: `{url}`"))?;
        let mut connection = CBox::new(ptr::null_mut(), close);
        let rc = unsafe {
            sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            )
        };
        let result = Self {
            cache: HashMap::new(),
            connection,
        };
        if rc != SQLITE_OK {
            let error = result
                .last_error()
                .context(format!("Could not open `{url}`"));
            log::error!("{error:#}");
            return Err(error);
        }
        unsafe {
            sqlite3_busy_timeout(*result.connection, BUSY_TIMEOUT_MS);
        }
        log::debug!("Connected to {url}");
        Ok(result)
    }

    fn abort_transaction(&mut self) {
        let rc = unsafe {
            sqlite3_exec(
                *self.connection,
                c"ROLLBACK;".as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if rc != SQLITE_OK {
            log::error!("Could not roll back: {}", self.last_error());
        }
    }
}
