use crate::SqlWriter;

/// Chunking policy of the batch insert and upsert paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInsertConfiguration {
    pub max_rows_per_batch: usize,
    /// Capped by the dialect ceiling.
    pub max_parameters_per_statement: usize,
    /// When disabled every row is sent in its own statement.
    pub enable_multi_row_insert: bool,
    pub enable_prepared_statement_reuse: bool,
}

impl BatchInsertConfiguration {
    pub const DEFAULT: Self = Self {
        max_rows_per_batch: 1000,
        max_parameters_per_statement: 2000,
        enable_multi_row_insert: true,
        enable_prepared_statement_reuse: true,
    };
    pub const SMALL_BATCH: Self = Self {
        max_rows_per_batch: 100,
        max_parameters_per_statement: 1000,
        enable_multi_row_insert: true,
        enable_prepared_statement_reuse: true,
    };
    pub const LARGE_BATCH: Self = Self {
        max_rows_per_batch: 5000,
        max_parameters_per_statement: 30000,
        enable_multi_row_insert: true,
        enable_prepared_statement_reuse: true,
    };
    /// One row per statement, accepted by every driver.
    pub const COMPATIBLE: Self = Self {
        max_rows_per_batch: 1,
        max_parameters_per_statement: 2000,
        enable_multi_row_insert: false,
        enable_prepared_statement_reuse: false,
    };

    /// Rows carried by one statement of `columns` parameters each, never zero.
    pub fn rows_per_statement(&self, columns: usize, writer: &dyn SqlWriter) -> usize {
        if !self.enable_multi_row_insert {
            return 1;
        }
        let parameters = self
            .max_parameters_per_statement
            .min(writer.max_parameters());
        self.max_rows_per_batch
            .min(writer.max_rows_per_statement())
            .min(parameters / columns.max(1))
            .max(1)
    }
}

impl Default for BatchInsertConfiguration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::BatchInsertConfiguration;
    use crate::writer::{MsSqlSqlWriter, PostgresSqlWriter, SqliteSqlWriter};

    #[test]
    fn rows_bounded_by_both_limits() {
        let postgres = PostgresSqlWriter::default();
        let config = BatchInsertConfiguration::DEFAULT;
        assert_eq!(config.rows_per_statement(5, &postgres), 400);
        assert_eq!(config.rows_per_statement(1, &postgres), 1000);
        // SQL Server ceiling below the configured one
        let large = BatchInsertConfiguration::LARGE_BATCH;
        assert_eq!(large.rows_per_statement(7, &MsSqlSqlWriter::default()), 300);
        assert_eq!(large.rows_per_statement(3, &SqliteSqlWriter::default()), 5000);
    }

    #[test]
    fn sql_server_values_list_capped() {
        let mssql = MsSqlSqlWriter::default();
        let large = BatchInsertConfiguration::LARGE_BATCH;
        assert_eq!(large.rows_per_statement(1, &mssql), 1000);
        assert_eq!(large.rows_per_statement(2, &mssql), 1000);
        assert_eq!(large.rows_per_statement(1, &PostgresSqlWriter::default()), 5000);
    }

    #[test]
    fn never_zero_rows() {
        let postgres = PostgresSqlWriter::default();
        let config = BatchInsertConfiguration {
            max_parameters_per_statement: 10,
            ..BatchInsertConfiguration::SMALL_BATCH
        };
        assert_eq!(config.rows_per_statement(40, &postgres), 1);
        assert_eq!(config.rows_per_statement(0, &postgres), 10);
    }

    #[test]
    fn compatible_is_row_by_row() {
        let config = BatchInsertConfiguration::COMPATIBLE;
        assert_eq!(config.rows_per_statement(2, &PostgresSqlWriter::default()), 1);
        assert!(!config.enable_prepared_statement_reuse);
        assert_eq!(BatchInsertConfiguration::default(), BatchInsertConfiguration::DEFAULT);
    }
}
