use quarry::{Driver, Executor, OrmError, Query, Result};

/// Integer primary key filled in by the database.
pub fn generated_key<Exec: Executor>() -> &'static str {
    match <Exec::Driver as Driver>::NAME {
        "postgres" => "BIGSERIAL PRIMARY KEY",
        "mysql" => "BIGINT AUTO_INCREMENT PRIMARY KEY",
        "mssql" => "BIGINT IDENTITY PRIMARY KEY",
        _ => "INTEGER PRIMARY KEY",
    }
}

pub fn binary_type<Exec: Executor>() -> &'static str {
    match <Exec::Driver as Driver>::NAME {
        "postgres" => "BYTEA",
        "mssql" => "VARBINARY(8)",
        _ => "BLOB",
    }
}

/// Drop and create `table`, the tests own their tables.
pub async fn recreate_table<Exec: Executor>(
    executor: &mut Exec,
    table: &str,
    columns: &[&str],
) -> Result<()> {
    executor
        .execute(Query::from(format!("DROP TABLE IF EXISTS {table};")))
        .await?;
    executor
        .execute(Query::from(format!(
            "CREATE TABLE {table} (\n    {}\n);",
            columns.join(",\n    ")
        )))
        .await?;
    Ok(())
}

/// Kind of the error, panicking with the error itself when the engine did not raise it.
pub fn error_kind(error: &quarry::Error) -> &OrmError {
    OrmError::kind_of(error).unwrap_or_else(|| panic!("Expected an engine error, got {error:#}"))
}
