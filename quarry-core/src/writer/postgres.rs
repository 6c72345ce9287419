use crate::{
    Expr, Result,
    writer::{Context, SqlWriter, check_json_path},
};
use std::fmt::Write;

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn dialect_name(&self) -> &'static str {
        "postgres"
    }

    fn write_parameter_placeholder(&self, _context: &mut Context, out: &mut String, index: usize) {
        let _ = write!(out, "${index}");
    }

    fn write_json_extract(
        &self,
        context: &mut Context,
        out: &mut String,
        target: &Expr,
        path: &[String],
    ) -> Result<()> {
        check_json_path(path)?;
        out.push('(');
        self.write_expression(context, out, target)?;
        let _ = write!(out, " #>> '{{{}}}')", path.join(","));
        Ok(())
    }
}
