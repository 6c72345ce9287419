use crate::error_message_from_ptr;
use libsqlite3_sys::*;
use quarry_core::{Error, Result, TIMESTAMP_FORMAT, Value, truncate_long};
use std::ffi::{CStr, c_char, c_int, c_void};
use time::format_description::well_known::Rfc3339;

unsafe fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

/// Bind `value` to the 1 based parameter `index`. Types without a SQLite storage class are
/// stored as text: decimals, uuids, dates, timestamps and json.
pub(crate) fn bind_value(statement: *mut sqlite3_stmt, index: c_int, value: &Value) -> Result<()> {
    if value.is_null() {
        return check(statement, index, unsafe { sqlite3_bind_null(statement, index) });
    }
    let rc = unsafe {
        match value {
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::UInt8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt32(Some(v)) => sqlite3_bind_int64(statement, index, *v as sqlite3_int64),
            Value::UInt64(Some(v)) => {
                let Ok(v) = sqlite3_int64::try_from(*v) else {
                    return Err(Error::msg(format!(
                        "Cannot bind u64 value `{v}` into a sqlite integer because it's out of bounds"
                    )));
                };
                sqlite3_bind_int64(statement, index, v)
            }
            Value::Float32(Some(v)) => sqlite3_bind_double(statement, index, *v as f64),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Decimal(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Timestamp(Some(v)) => bind_text(statement, index, &v.format(TIMESTAMP_FORMAT)?),
            Value::TimestampWithTimezone(Some(v)) => {
                bind_text(statement, index, &v.format(&Rfc3339)?)
            }
            Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Json(Some(v)) => bind_text(statement, index, &v.to_string()),
            _ => {
                let error = Error::msg(format!("Cannot use a {value:?} as a query parameter"));
                log::error!("{error:#}");
                return Err(error);
            }
        }
    };
    check(statement, index, rc)
}

fn check(statement: *mut sqlite3_stmt, index: c_int, rc: c_int) -> Result<()> {
    if rc == SQLITE_OK {
        return Ok(());
    }
    unsafe {
        let db = sqlite3_db_handle(statement);
        let query = CStr::from_ptr(sqlite3_sql(statement)).to_string_lossy();
        let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string()).context(
            format!(
                "Cannot bind parameter {index} to query:\n{}",
                truncate_long!(query)
            ),
        );
        log::error!("{error:#}");
        Err(error)
    }
}
