use crate::{
    AggregateFunction, BinaryOpType, EntityMetadata, Expr, FrameBound, FrameUnits, OpPrecedence,
    Order, Ordered, OrmError, Result, Row, SetOperator, StringMethod, Value, WindowFunction,
    WindowSpec, possibly_parenthesized, separated_by,
    writer::{Context, Fragment},
};
use std::fmt::Write;

/// Dialect printer converting the semantic constructs (expressions, statements, clauses) into
/// concrete SQL text, binding every value as a parameter in `Context::params`.
///
/// Every method has a default rendering close to ANSI SQL; dialects override the pieces where
/// their syntax diverges (quoting, placeholders, paging, upsert, JSON, transactions).
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Name used in error messages.
    fn dialect_name(&self) -> &'static str {
        "generic"
    }

    /// Upper bound of bound parameters accepted in one statement.
    fn max_parameters(&self) -> usize {
        65535
    }

    /// Upper bound of rows in one multi-row `VALUES` list.
    fn max_rows_per_statement(&self) -> usize {
        usize::MAX
    }

    /// Whether INSERT can hand back the generated primary key in the same statement.
    fn supports_returning(&self) -> bool {
        true
    }

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    /// Render the table of an entity, followed by its alias when given.
    fn write_table_ref(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        alias: Option<&str>,
    ) {
        if let Some(schema) = metadata.schema {
            self.write_identifier_quoted(context, out, schema);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, metadata.table);
        if let Some(alias) = alias {
            let _ = write!(out, " {alias}");
        }
    }

    /// Render a column, qualified with the table alias when the context asks for it.
    fn write_column_ref(
        &self,
        context: &mut Context,
        out: &mut String,
        alias: Option<&str>,
        column: &str,
    ) {
        if context.qualify_columns
            && let Some(alias) = alias
        {
            out.push_str(alias);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, column);
    }

    /// Render the placeholder of the `index`-th parameter (1 based).
    fn write_parameter_placeholder(&self, _context: &mut Context, out: &mut String, _index: usize) {
        out.push('?');
    }

    /// Bind the value and render its placeholder.
    fn write_parameter(&self, context: &mut Context, out: &mut String, value: Value) {
        context.params.push(value);
        let index = context.params.len();
        self.write_parameter_placeholder(context, out, index);
    }

    /// Render boolean literal.
    fn write_value_bool(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(["false", "true"][value as usize]);
    }

    /// Render a predicate that is constantly true or false.
    fn write_constant_predicate(&self, context: &mut Context, out: &mut String, value: bool) {
        self.write_value_bool(context, out, value);
    }

    /// Escape the LIKE wildcards of a user supplied string (escape character `\`).
    fn like_escape(&self, value: &str) -> String {
        let mut result = String::with_capacity(value.len() + 4);
        for c in value.chars() {
            if matches!(c, '\\' | '%' | '_') {
                result.push('\\');
            }
            result.push(c);
        }
        result
    }

    fn write_like_escape_clause(&self, _context: &mut Context, out: &mut String) {
        out.push_str(" ESCAPE '\\'");
    }

    /// Render the paging clause, `limit` and `offset` are never both `None`.
    fn write_limit_offset(
        &self,
        _context: &mut Context,
        out: &mut String,
        limit: Option<u64>,
        offset: Option<u64>,
    ) {
        if let Some(limit) = limit {
            let _ = write!(out, "\nLIMIT {limit}");
        }
        if let Some(offset) = offset {
            let _ = write!(out, "\nOFFSET {offset}");
        }
    }

    /// Render the text extraction of a JSON path.
    fn write_json_extract(
        &self,
        context: &mut Context,
        out: &mut String,
        target: &Expr,
        path: &[String],
    ) -> Result<()> {
        out.push_str("JSON_VALUE(");
        self.write_expression(context, out, target)?;
        out.push_str(", ");
        write_json_path(out, path)?;
        out.push(')');
        Ok(())
    }

    fn write_case_function(&self, _context: &mut Context, out: &mut String, method: StringMethod) {
        out.push_str(match method {
            StringMethod::ToLower => "LOWER",
            _ => "UPPER",
        });
    }

    fn write_with_keyword(&self, _context: &mut Context, out: &mut String, recursive: bool) {
        out.push_str(if recursive { "WITH RECURSIVE " } else { "WITH " });
    }

    fn write_set_operand_open(&self, _context: &mut Context, out: &mut String) {
        out.push('(');
    }

    fn write_set_operand_close(&self, _context: &mut Context, out: &mut String) {
        out.push(')');
    }

    fn write_set_operator(&self, _context: &mut Context, out: &mut String, value: SetOperator) {
        out.push_str(match value {
            SetOperator::Union => "UNION",
            SetOperator::UnionAll => "UNION ALL",
            SetOperator::Intersect => "INTERSECT",
            SetOperator::Except => "EXCEPT",
        });
    }

    /// Precedence table for binary operators.
    fn expression_binary_op_precedence(&self, value: &BinaryOpType) -> i32 {
        match value {
            BinaryOpType::Or => 100,
            BinaryOpType::And => 200,
            BinaryOpType::Equal => 300,
            BinaryOpType::NotEqual => 300,
            BinaryOpType::Less => 300,
            BinaryOpType::Greater => 300,
            BinaryOpType::LessEqual => 300,
            BinaryOpType::GreaterEqual => 300,
            BinaryOpType::Subtraction => 800,
            BinaryOpType::Addition => 800,
            BinaryOpType::Multiplication => 900,
        }
    }

    fn expression_precedence(&self, value: &Expr) -> i32 {
        match value {
            Expr::Binary { op, .. } => self.expression_binary_op_precedence(op),
            Expr::Not(..) => 250,
            Expr::In { .. } | Expr::IsNull { .. } => 400,
            Expr::Method {
                method: StringMethod::Contains | StringMethod::StartsWith | StringMethod::EndsWith,
                ..
            } => 400,
            _ => 1_000_000,
        }
    }

    /// Translate an expression tree.
    fn write_expression(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &Expr,
    ) -> Result<()> {
        match value {
            Expr::Constant(v) => {
                self.write_parameter(context, out, v.clone());
                Ok(())
            }
            Expr::Member(path) => self.write_expression_member(context, out, path),
            Expr::Binary { op, lhs, rhs } => {
                self.write_expression_binary_op(context, out, *op, lhs, rhs)
            }
            Expr::Not(v) => {
                out.push_str("NOT ");
                possibly_parenthesized!(
                    out,
                    v.precedence(self.as_dyn()) <= 250,
                    self.write_expression(context, out, v)?
                );
                Ok(())
            }
            Expr::Method {
                method,
                target,
                argument,
            } => self.write_expression_method(context, out, *method, target, argument.as_deref()),
            Expr::In { target, values } => self.write_expression_in(context, out, target, values),
            Expr::IsNull { target, negated } => {
                self.write_expression_is_null(context, out, target, *negated)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                out.push_str("CASE WHEN ");
                self.write_expression(context, out, condition)?;
                out.push_str(" THEN ");
                self.write_expression(context, out, then)?;
                out.push_str(" ELSE ");
                self.write_expression(context, out, otherwise)?;
                out.push_str(" END");
                Ok(())
            }
            Expr::Aggregate { function, argument } => {
                self.write_expression_aggregate(context, out, *function, argument.as_deref())
            }
            Expr::JsonPath { target, path } => self.write_json_extract(context, out, target, path),
        }
    }

    /// Resolve a member path through the registered aliases.
    fn write_expression_member(
        &self,
        context: &mut Context,
        out: &mut String,
        path: &[String],
    ) -> Result<()> {
        let Some((column, navigation)) = path.split_last() else {
            return Err(OrmError::Translation("empty member access".into()).into());
        };
        let Some(aliases) = context.aliases else {
            if !navigation.is_empty() {
                return Err(OrmError::Translation(format!(
                    "member `{}` crosses a navigation but no join is registered",
                    path.join(".")
                ))
                .into());
            }
            self.write_identifier_quoted(context, out, column);
            return Ok(());
        };
        let Some(entry) = aliases.find(navigation) else {
            return Err(OrmError::Translation(format!(
                "navigation `{}` is not joined, include it before referencing `{}`",
                navigation.join("."),
                path.join(".")
            ))
            .into());
        };
        match entry.metadata.column(column) {
            Some(mapping) => {
                let alias = entry.alias.clone();
                self.write_column_ref(context, out, Some(&alias), mapping.name);
                Ok(())
            }
            None if navigation.is_empty() && context.fragment == Fragment::SqlSelectOrderBy => {
                // Projection or window alias
                self.write_identifier_quoted(context, out, column);
                Ok(())
            }
            None => Err(OrmError::Translation(format!(
                "`{}` has no column `{column}`",
                entry.metadata.type_name
            ))
            .into()),
        }
    }

    /// Render binary operator expression handling precedence / parenthesis.
    fn write_expression_binary_op(
        &self,
        context: &mut Context,
        out: &mut String,
        op: BinaryOpType,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<()> {
        if op.is_comparison() {
            if lhs.is_null_constant() || rhs.is_null_constant() {
                let target = if rhs.is_null_constant() { lhs } else { rhs };
                return match op {
                    BinaryOpType::Equal => {
                        self.write_expression_is_null(context, out, target, false)
                    }
                    BinaryOpType::NotEqual => {
                        self.write_expression_is_null(context, out, target, true)
                    }
                    _ => Err(OrmError::NotSupported(format!(
                        "ordering comparison ({op}) against NULL"
                    ))
                    .into()),
                };
            }
            if let Some(value) = case_mismatch(op, lhs, rhs) {
                self.write_constant_predicate(context, out, value);
                return Ok(());
            }
        }
        let infix = match op {
            BinaryOpType::Multiplication => " * ",
            BinaryOpType::Addition => " + ",
            BinaryOpType::Subtraction => " - ",
            BinaryOpType::Equal => " = ",
            BinaryOpType::NotEqual => " <> ",
            BinaryOpType::Less => " < ",
            BinaryOpType::LessEqual => " <= ",
            BinaryOpType::Greater => " > ",
            BinaryOpType::GreaterEqual => " >= ",
            BinaryOpType::And => " AND ",
            BinaryOpType::Or => " OR ",
        };
        let precedence = self.expression_binary_op_precedence(&op);
        let mixes_logic = |child: &Expr| {
            op == BinaryOpType::Or
                && matches!(
                    child,
                    Expr::Binary {
                        op: BinaryOpType::And,
                        ..
                    }
                )
        };
        possibly_parenthesized!(
            out,
            lhs.precedence(self.as_dyn()) < precedence || mixes_logic(lhs),
            self.write_expression(context, out, lhs)?
        );
        out.push_str(infix);
        let same_associative = op.is_associative()
            && matches!(rhs, Expr::Binary { op: child, .. } if *child == op);
        possibly_parenthesized!(
            out,
            (rhs.precedence(self.as_dyn()) <= precedence && !same_associative) || mixes_logic(rhs),
            self.write_expression(context, out, rhs)?
        );
        Ok(())
    }

    fn write_expression_method(
        &self,
        context: &mut Context,
        out: &mut String,
        method: StringMethod,
        target: &Expr,
        argument: Option<&Expr>,
    ) -> Result<()> {
        let (prefix, suffix) = match method {
            StringMethod::ToUpper | StringMethod::ToLower => {
                self.write_case_function(context, out, method);
                out.push('(');
                self.write_expression(context, out, target)?;
                out.push(')');
                return Ok(());
            }
            StringMethod::Contains => ("%", "%"),
            StringMethod::StartsWith => ("", "%"),
            StringMethod::EndsWith => ("%", ""),
        };
        let pattern = match argument {
            Some(Expr::Constant(Value::Varchar(Some(v)))) => v,
            Some(Expr::Constant(v)) if v.is_null() => {
                return Err(OrmError::NotSupported(format!(
                    "{method:?} with a NULL argument"
                ))
                .into());
            }
            _ => {
                return Err(OrmError::NotSupported(format!(
                    "{method:?} requires a constant string argument"
                ))
                .into());
            }
        };
        possibly_parenthesized!(
            out,
            target.precedence(self.as_dyn()) < 400,
            self.write_expression(context, out, target)?
        );
        out.push_str(" LIKE ");
        let pattern = format!("{prefix}{}{suffix}", self.like_escape(pattern));
        self.write_parameter(context, out, Value::Varchar(Some(pattern)));
        self.write_like_escape_clause(context, out);
        Ok(())
    }

    /// `target IN (...)`, an empty list renders the always false predicate.
    fn write_expression_in(
        &self,
        context: &mut Context,
        out: &mut String,
        target: &Expr,
        values: &[Value],
    ) -> Result<()> {
        if values.is_empty() {
            self.write_constant_predicate(context, out, false);
            return Ok(());
        }
        possibly_parenthesized!(
            out,
            target.precedence(self.as_dyn()) < 400,
            self.write_expression(context, out, target)?
        );
        out.push_str(" IN (");
        separated_by(
            out,
            values,
            |out, v| self.write_parameter(context, out, v.clone()),
            ", ",
        );
        out.push(')');
        Ok(())
    }

    fn write_expression_is_null(
        &self,
        context: &mut Context,
        out: &mut String,
        target: &Expr,
        negated: bool,
    ) -> Result<()> {
        possibly_parenthesized!(
            out,
            target.precedence(self.as_dyn()) < 400,
            self.write_expression(context, out, target)?
        );
        out.push_str(if negated { " IS NOT NULL" } else { " IS NULL" });
        Ok(())
    }

    fn write_expression_aggregate(
        &self,
        context: &mut Context,
        out: &mut String,
        function: AggregateFunction,
        argument: Option<&Expr>,
    ) -> Result<()> {
        if context.fragment.is_filter() {
            return Err(OrmError::NotSupported(format!(
                "aggregate {function:?} inside a row filter, use having instead"
            ))
            .into());
        }
        out.push_str(match function {
            AggregateFunction::Count => "COUNT(",
            AggregateFunction::Sum => "SUM(",
            AggregateFunction::Avg => "AVG(",
            AggregateFunction::Min => "MIN(",
            AggregateFunction::Max => "MAX(",
        });
        match argument {
            Some(v) => self.write_expression(context, out, v)?,
            None if function == AggregateFunction::Count => out.push('*'),
            None => {
                return Err(OrmError::Translation(format!(
                    "aggregate {function:?} requires an argument"
                ))
                .into());
            }
        }
        out.push(')');
        Ok(())
    }

    /// Render ordered expression inside ORDER BY.
    fn write_expression_ordered(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &Ordered,
    ) -> Result<()> {
        self.write_expression(context, out, &value.expression)?;
        out.push_str(match value.order {
            Order::ASC => " ASC",
            Order::DESC => " DESC",
        });
        Ok(())
    }

    /// `FUNCTION(...) OVER (PARTITION BY ... ORDER BY ... frame)`
    fn write_window_function(
        &self,
        context: &mut Context,
        out: &mut String,
        value: &WindowSpec,
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlWindow);
        match &value.function {
            WindowFunction::RowNumber => out.push_str("ROW_NUMBER()"),
            WindowFunction::Rank => out.push_str("RANK()"),
            WindowFunction::DenseRank => out.push_str("DENSE_RANK()"),
            WindowFunction::Aggregate(function, argument) => {
                self.write_expression_aggregate(&mut context, out, *function, argument.as_ref())?
            }
        }
        out.push_str(" OVER (");
        let len = out.len();
        if !value.partition_by.is_empty() {
            out.push_str("PARTITION BY ");
            for (i, v) in value.partition_by.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_expression(&mut context, out, v)?;
            }
        }
        if !value.order_by.is_empty() {
            if out.len() > len {
                out.push(' ');
            }
            out.push_str("ORDER BY ");
            for (i, v) in value.order_by.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_expression_ordered(&mut context, out, v)?;
            }
        }
        if let Some(frame) = &value.frame {
            if out.len() > len {
                out.push(' ');
            }
            out.push_str(match frame.units {
                FrameUnits::Rows => "ROWS BETWEEN ",
                FrameUnits::Range => "RANGE BETWEEN ",
            });
            write_frame_bound(out, frame.start);
            out.push_str(" AND ");
            write_frame_bound(out, frame.end);
        }
        out.push(')');
        Ok(())
    }

    /// Emit BEGIN statement.
    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN;");
    }

    /// Emit COMMIT statement.
    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    /// Emit ROLLBACK statement.
    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }

    fn write_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "SAVEPOINT {name};");
    }

    /// Leaves `out` empty when the dialect has no release statement.
    fn write_release_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "RELEASE SAVEPOINT {name};");
    }

    fn write_rollback_to_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "ROLLBACK TO SAVEPOINT {name};");
    }

    /// Emit INSERT of the given columns, one parenthesized group per row.
    fn write_insert(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        columns: &[usize],
        rows: &[Row],
        returning: bool,
    ) {
        out.reserve(64 + rows.len() * columns.len() * 6);
        out.push_str("INSERT INTO ");
        self.write_table_ref(context, out, metadata, None);
        out.push_str(" (");
        separated_by(
            out,
            columns,
            |out, v| self.write_identifier_quoted(context, out, metadata.columns[*v].name),
            ", ",
        );
        out.push(')');
        if returning {
            self.write_insert_output(context, out, metadata);
        }
        out.push_str(" VALUES\n");
        self.write_insert_values(context, out, columns, rows);
        if returning {
            self.write_insert_returning(context, out, metadata);
        }
        out.push(';');
    }

    fn write_insert_values(
        &self,
        context: &mut Context,
        out: &mut String,
        columns: &[usize],
        rows: &[Row],
    ) {
        let mut context = context.switch_fragment(Fragment::SqlInsertIntoValues);
        separated_by(
            out,
            rows,
            |out, row| {
                out.push('(');
                separated_by(
                    out,
                    columns,
                    |out, v| self.write_parameter(&mut context, out, row[*v].clone()),
                    ", ",
                );
                out.push(')');
            },
            ",\n",
        );
    }

    /// Clause between the column list and VALUES returning the generated key.
    fn write_insert_output(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _metadata: &EntityMetadata,
    ) {
    }

    /// Clause after VALUES returning the generated key.
    fn write_insert_returning(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
    ) {
        out.push_str("\nRETURNING ");
        self.write_identifier_quoted(context, out, metadata.primary_key().name);
    }

    /// Emit an INSERT that updates the existing row when one with the same `conflict_columns`
    /// values is already present.
    fn write_upsert(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        columns: &[usize],
        conflict_columns: &[usize],
        rows: &[Row],
    ) {
        self.write_insert(context, out, metadata, columns, rows, false);
        out.pop();
        let mut context = context.switch_fragment(Fragment::SqlInsertIntoOnConflict);
        self.write_upsert_fragment(&mut context, out, metadata, columns, conflict_columns);
        out.push(';');
    }

    /// Emit ON CONFLICT DO UPDATE fragment for upsert.
    fn write_upsert_fragment(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        columns: &[usize],
        conflict_columns: &[usize],
    ) {
        out.push_str("\nON CONFLICT (");
        separated_by(
            out,
            conflict_columns,
            |out, v| self.write_identifier_quoted(context, out, metadata.columns[*v].name),
            ", ",
        );
        out.push(')');
        let updated = upsert_assignments(metadata, columns, conflict_columns);
        if updated.is_empty() {
            out.push_str(" DO NOTHING");
            return;
        }
        out.push_str(" DO UPDATE SET\n");
        separated_by(
            out,
            updated,
            |out, v| {
                let name = metadata.columns[v].name;
                self.write_identifier_quoted(context, out, name);
                out.push_str(" = EXCLUDED.");
                self.write_identifier_quoted(context, out, name);
            },
            ",\n",
        );
    }

    /// Emit UPDATE statement with SET list and WHERE clause.
    fn write_update(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        assignments: &[(usize, Value)],
        condition: &Expr,
    ) -> Result<()> {
        out.push_str("UPDATE ");
        self.write_table_ref(context, out, metadata, None);
        out.push_str(" SET\n");
        {
            let mut context = context.switch_fragment(Fragment::SqlUpdateSet);
            separated_by(
                out,
                assignments,
                |out, (column, value)| {
                    self.write_identifier_quoted(&mut context, out, metadata.columns[*column].name);
                    out.push_str(" = ");
                    self.write_parameter(&mut context, out, value.clone());
                },
                ",\n",
            );
        }
        out.push_str("\nWHERE ");
        self.write_expression(
            &mut context.switch_fragment(Fragment::SqlUpdateWhere),
            out,
            condition,
        )?;
        out.push(';');
        Ok(())
    }

    /// Emit DELETE statement with WHERE clause.
    fn write_delete(
        &self,
        context: &mut Context,
        out: &mut String,
        metadata: &EntityMetadata,
        condition: &Expr,
    ) -> Result<()> {
        out.push_str("DELETE FROM ");
        self.write_table_ref(context, out, metadata, None);
        out.push_str("\nWHERE ");
        self.write_expression(
            &mut context.switch_fragment(Fragment::SqlDeleteFromWhere),
            out,
            condition,
        )?;
        out.push(';');
        Ok(())
    }
}

/// `ToUpper(x) = 'abc'` can never hold: the literal has a character the function cannot produce.
fn case_mismatch(op: BinaryOpType, lhs: &Expr, rhs: &Expr) -> Option<bool> {
    if !matches!(op, BinaryOpType::Equal | BinaryOpType::NotEqual) {
        return None;
    }
    let (method, literal) = match (lhs, rhs) {
        (Expr::Method { method, .. }, Expr::Constant(Value::Varchar(Some(v))))
        | (Expr::Constant(Value::Varchar(Some(v))), Expr::Method { method, .. }) => (method, v),
        _ => return None,
    };
    let matches = match method {
        StringMethod::ToUpper => *literal == literal.to_uppercase(),
        StringMethod::ToLower => *literal == literal.to_lowercase(),
        _ => return None,
    };
    if matches {
        None
    } else {
        Some(op == BinaryOpType::NotEqual)
    }
}

/// Columns an upsert overwrites: everything but the conflict target and the primary key.
pub(crate) fn upsert_assignments(
    metadata: &EntityMetadata,
    columns: &[usize],
    conflict_columns: &[usize],
) -> Vec<usize> {
    columns
        .iter()
        .copied()
        .filter(|v| *v != metadata.primary_key && !conflict_columns.contains(v))
        .collect()
}

fn write_frame_bound(out: &mut String, value: FrameBound) {
    match value {
        FrameBound::UnboundedPreceding => out.push_str("UNBOUNDED PRECEDING"),
        FrameBound::Preceding(n) => drop(write!(out, "{n} PRECEDING")),
        FrameBound::CurrentRow => out.push_str("CURRENT ROW"),
        FrameBound::Following(n) => drop(write!(out, "{n} FOLLOWING")),
        FrameBound::UnboundedFollowing => out.push_str("UNBOUNDED FOLLOWING"),
    }
}

/// Segments are inlined, they must be plain keys or array indexes.
pub(crate) fn check_json_path(path: &[String]) -> Result<()> {
    for segment in path {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(OrmError::NotSupported(format!(
                "JSON path segment `{segment}`, only alphanumeric keys and indexes are accepted"
            ))
            .into());
        }
    }
    Ok(())
}

/// `'$.a.b[0]'`
pub(crate) fn write_json_path(out: &mut String, path: &[String]) -> Result<()> {
    check_json_path(path)?;
    out.push_str("'$");
    for segment in path {
        if segment.chars().all(|c| c.is_ascii_digit()) {
            let _ = write!(out, "[{segment}]");
        } else {
            let _ = write!(out, ".{segment}");
        }
    }
    out.push('\'');
    Ok(())
}

/// Fallback generic SQL writer, ANSI quoting with `?` placeholders.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
