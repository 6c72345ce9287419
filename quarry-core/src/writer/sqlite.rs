use crate::{
    Expr, Result,
    writer::{Context, SqlWriter, write_json_path},
};
use std::fmt::Write;

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect_name(&self) -> &'static str {
        "sqlite"
    }

    fn max_parameters(&self) -> usize {
        32766
    }

    fn write_value_bool(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push(['0', '1'][value as usize]);
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
            (None, Some(offset)) => drop(write!(out, "\nLIMIT -1 OFFSET {offset}")),
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
        out.push_str("json_extract(");
        self.write_expression(context, out, target)?;
        out.push_str(", ");
        write_json_path(out, path)?;
        out.push(')');
        Ok(())
    }

    fn write_set_operand_open(&self, _context: &mut Context, out: &mut String) {
        // Compound operands cannot be parenthesized
        out.push_str("SELECT * FROM (");
    }
}
