use crate::{
    EntityMetadata, Row, separated_by,
    writer::{Context, Fragment, SqlWriter, upsert_assignments},
};
use std::fmt::Write;

#[derive(Default, Debug, Clone, Copy)]
pub struct MsSqlSqlWriter {}

impl SqlWriter for MsSqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect_name(&self) -> &'static str {
        "mssql"
    }

    fn max_parameters(&self) -> usize {
        2100
    }

    fn max_rows_per_statement(&self) -> usize {
        1000
    }

    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('[');
        self.write_escaped(context, out, value, ']', "]]");
        out.push(']');
    }

    fn write_parameter_placeholder(&self, _context: &mut Context, out: &mut String, index: usize) {
        let _ = write!(out, "@p{index}");
    }

    fn write_value_bool(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push(['0', '1'][value as usize]);
    }

    fn write_constant_predicate(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(if value { "1 = 1" } else { "1 = 0" });
    }

    fn like_escape(&self, value: &str) -> String {
        let mut result = String::with_capacity(value.len() + 4);
        for c in value.chars() {
            if matches!(c, '\\' | '%' | '_' | '[') {
                result.push('\\');
            }
            result.push(c);
        }
        result
    }

    /// Requires an ORDER BY, the planner always emits one when paging.
    fn write_limit_offset(
        &self,
        _context: &mut Context,
        out: &mut String,
        limit: Option<u64>,
        offset: Option<u64>,
    ) {
        let _ = write!(out, "\nOFFSET {} ROWS", offset.unwrap_or(0));
        if let Some(limit) = limit {
            let _ = write!(out, " FETCH NEXT {limit} ROWS ONLY");
        }
    }

    fn write_with_keyword(&self, _context: &mut Context, out: &mut String, _recursive: bool) {
        out.push_str("WITH ");
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN TRANSACTION;");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT TRANSACTION;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK TRANSACTION;");
    }

    fn write_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "SAVE TRANSACTION {name};");
    }

    fn write_release_savepoint(&self, _out: &mut String, _name: &str) {}

    fn write_rollback_to_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "ROLLBACK TRANSACTION {name};");
    }

    fn write_insert_output(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
    ) {
        out.push_str(" OUTPUT INSERTED.");
        self.write_identifier_quoted(context, out, metadata.primary_key().name);
    }

    fn write_insert_returning(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _metadata: &EntityMetadata,
    ) {
    }

    fn write_upsert(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        columns: &[usize],
        conflict_columns: &[usize],
        rows: &[Row],
    ) {
        out.push_str("MERGE INTO ");
        self.write_table_ref(context, out, metadata, None);
        out.push_str(" WITH (HOLDLOCK) AS target\nUSING (VALUES\n");
        self.write_insert_values(context, out, columns, rows);
        out.push_str(") AS source (");
        let mut context = context.switch_fragment(Fragment::SqlInsertIntoOnConflict);
        separated_by(
            out,
            columns,
            |out, v| self.write_identifier_quoted(&mut context, out, metadata.columns[*v].name),
            ", ",
        );
        out.push_str(")\nON ");
        separated_by(
            out,
            conflict_columns,
            |out, v| {
                let name = metadata.columns[*v].name;
                out.push_str("target.");
                self.write_identifier_quoted(&mut context, out, name);
                out.push_str(" = source.");
                self.write_identifier_quoted(&mut context, out, name);
            },
            " AND ",
        );
        let updated = upsert_assignments(metadata, columns, conflict_columns);
        if !updated.is_empty() {
            out.push_str("\nWHEN MATCHED THEN UPDATE SET\n");
            separated_by(
                out,
                updated,
                |out, v| {
                    let name = metadata.columns[v].name;
                    out.push_str("target.");
                    self.write_identifier_quoted(&mut context, out, name);
                    out.push_str(" = source.");
                    self.write_identifier_quoted(&mut context, out, name);
                },
                ",\n",
            );
        }
        out.push_str("\nWHEN NOT MATCHED THEN INSERT (");
        separated_by(
            out,
            columns,
            |out, v| self.write_identifier_quoted(&mut context, out, metadata.columns[*v].name),
            ", ",
        );
        out.push_str(") VALUES (");
        separated_by(
            out,
            columns,
            |out, v| {
                out.push_str("source.");
                self.write_identifier_quoted(&mut context, out, metadata.columns[*v].name);
            },
            ", ",
        );
        out.push_str(");");
    }
}
