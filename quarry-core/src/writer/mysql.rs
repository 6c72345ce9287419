use crate::{
    EntityMetadata, Expr, Result, separated_by,
    writer::{Context, SqlWriter, upsert_assignments, write_json_path},
};
use std::fmt::Write;

#[derive(Default, Debug, Clone, Copy)]
pub struct MySqlSqlWriter {}

impl SqlWriter for MySqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect_name(&self) -> &'static str {
        "mysql"
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(context, out, value, '`', "``");
        out.push('`');
    }

    fn write_value_bool(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(["FALSE", "TRUE"][value as usize]);
    }

    fn write_like_escape_clause(&self, _context: &mut Context, out: &mut String) {
        // Backslash escapes inside string literals too
        out.push_str(" ESCAPE '\\\\'");
    }

    fn write_limit_offset(
        &self,
        _context: &mut Context,
        out: &mut String,
        limit: Option<u64>,
        offset: Option<u64>,
    ) {
        match (limit, offset) {
            (Some(limit), None) => drop(write!(out, "\nLIMIT {limit}")),
            (Some(limit), Some(offset)) => drop(write!(out, "\nLIMIT {limit} OFFSET {offset}")),
            (None, Some(offset)) => drop(write!(out, "\nLIMIT {} OFFSET {offset}", u64::MAX)),
            (None, None) => {}
        }
    }

    fn write_json_extract(
        &self,
        context: &mut Context,
        out: &mut String,
        target: &Expr,
        path: &[String],
    ) -> Result<()> {
        out.push_str("JSON_UNQUOTE(JSON_EXTRACT(");
        self.write_expression(context, out, target)?;
        out.push_str(", ");
        write_json_path(out, path)?;
        out.push_str("))");
        Ok(())
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("START TRANSACTION;");
    }

    fn write_insert_returning(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _metadata: &EntityMetadata,
    ) {
    }

    /// MySQL resolves conflicts on every unique key, `conflict_columns` only keeps those
    /// columns out of the update.
    fn write_upsert_fragment(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        columns: &[usize],
        conflict_columns: &[usize],
    ) {
        out.push_str("\nON DUPLICATE KEY UPDATE\n");
        let updated = upsert_assignments(metadata, columns, conflict_columns);
        if updated.is_empty() {
            let name = metadata.primary_key().name;
            self.write_identifier_quoted(context, out, name);
            out.push_str(" = ");
            self.write_identifier_quoted(context, out, name);
            return;
        }
        separated_by(
            out,
            updated,
            |out, v| {
                let name = metadata.columns[v].name;
                self.write_identifier_quoted(context, out, name);
                out.push_str(" = VALUES(");
                self.write_identifier_quoted(context, out, name);
                out.push(')');
            },
            ",\n",
        );
    }
}
