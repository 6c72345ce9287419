use crate::{
    AliasTable, Cte, CteBody, Entity, EntityMetadata, Expr, OpPrecedence, Ordered, OrmError,
    Projection, ProjectionSource, Query, RawSql, Result, SqlWriter, WindowSpec, metadata_of,
    plan::include::IncludeGraph,
    possibly_parenthesized, separated_by,
    writer::{Context, Fragment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Expr(Expr),
    Raw(RawSql),
}

/// Everything a select statement is made of. Rendering depends only on the plan and the writer.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Resolved when rendering.
    pub root: fn() -> Result<&'static EntityMetadata>,
    /// Implicitly ANDed.
    pub filters: Vec<Filter>,
    pub order_by: Vec<Ordered>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub distinct: bool,
    /// Empty selects the entity columns.
    pub projection: Vec<Projection>,
    pub group_by: Vec<Expr>,
    pub having: Vec<Expr>,
    /// Navigation paths from the root, `["books", "publisher"]`.
    pub includes: Vec<Vec<String>>,
    pub ctes: Vec<Cte>,
    pub windows: Vec<WindowSpec>,
    pub joins: Vec<RawSql>,
    pub set_operations: Vec<(SetOperator, QueryPlan)>,
}

enum Ordering<'p> {
    Unordered,
    Explicit(&'p [Ordered]),
    PrimaryKey,
    Ordinal,
}

impl QueryPlan {
    pub fn new(root: fn() -> Result<&'static EntityMetadata>) -> Self {
        Self {
            root,
            filters: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            distinct: false,
            projection: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            includes: Vec::new(),
            ctes: Vec::new(),
            windows: Vec::new(),
            joins: Vec::new(),
            set_operations: Vec::new(),
        }
    }

    pub fn of<E: Entity>() -> Self {
        Self::new(metadata_of::<E>)
    }

    pub fn root_metadata(&self) -> Result<&'static EntityMetadata> {
        (self.root)()
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Whether the rows come out labelled `tN__column` and must be stitched.
    pub fn is_graph(&self) -> bool {
        !self.includes.is_empty() && self.projection.is_empty()
    }

    pub fn build_sql(&self, writer: &dyn SqlWriter) -> Result<Query> {
        let mut context = Context::new(Fragment::None, true);
        let mut out = String::with_capacity(256);
        self.write_ctes(writer, &mut context, &mut out)?;
        self.write_query(writer, &mut context, &mut out)?;
        out.push(';');
        Ok(Query::new(out, context.params))
    }

    /// `SELECT COUNT(*) FROM (...) q`. Included entities are counted once per root row: only the
    /// joins that cannot multiply root rows are kept, so filters on them still resolve.
    pub fn build_count_sql(&self, writer: &dyn SqlWriter) -> Result<Query> {
        let mut context = Context::new(Fragment::None, true);
        let mut out = String::with_capacity(256);
        self.write_ctes(writer, &mut context, &mut out)?;
        out.push_str("SELECT COUNT(*) FROM (");
        if self.is_graph() && self.set_operations.is_empty() && self.group_by.is_empty() {
            let graph = self.include_graph()?;
            self.write_root_rows(writer, &mut context, &mut out, &graph)?;
        } else {
            let mut inner = self.clone();
            if !inner.is_paged() {
                inner.order_by.clear();
            }
            inner.write_query(writer, &mut context, &mut out)?;
        }
        out.push_str(") q;");
        Ok(Query::new(out, context.params))
    }

    pub(crate) fn include_graph(&self) -> Result<IncludeGraph> {
        IncludeGraph::resolve(self.root_metadata()?, &self.includes)
    }

    fn write_ctes(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        if self.ctes.is_empty() {
            return Ok(());
        }
        writer.write_with_keyword(context, out, self.ctes.iter().any(|v| v.recursive));
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                out.push_str(",\n");
            }
            writer.write_identifier_quoted(context, out, &cte.name);
            if !cte.columns.is_empty() {
                out.push_str(" (");
                separated_by(
                    out,
                    &cte.columns,
                    |out, v| writer.write_identifier_quoted(context, out, v),
                    ", ",
                );
                out.push(')');
            }
            out.push_str(" AS (\n");
            match &cte.body {
                CteBody::Raw(raw) => raw.write(writer, context, out)?,
                CteBody::Plan(plan) => {
                    plan.check_nested("common table expression")?;
                    plan.write_query(writer, context, out)?
                }
            }
            out.push_str("\n)");
        }
        out.push('\n');
        Ok(())
    }

    fn check_nested(&self, place: &str) -> Result<()> {
        if !self.ctes.is_empty() {
            return Err(OrmError::NotSupported(format!(
                "WITH clause inside a {place}, declare it on the outer query"
            ))
            .into());
        }
        Ok(())
    }

    fn write_query(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        if self.set_operations.is_empty() {
            return self.write_select(writer, context, out, false);
        }
        if !self.includes.is_empty()
            || self.set_operations.iter().any(|(_, v)| !v.includes.is_empty())
        {
            return Err(OrmError::NotSupported(
                "include combined with set operations".into(),
            )
            .into());
        }
        writer.write_set_operand_open(context, out);
        self.write_select(writer, context, out, true)?;
        writer.write_set_operand_close(context, out);
        for (operator, operand) in &self.set_operations {
            operand.check_nested("set operation operand")?;
            out.push('\n');
            writer.write_set_operator(context, out, *operator);
            out.push('\n');
            writer.write_set_operand_open(context, out);
            operand.write_query(writer, context, out)?;
            writer.write_set_operand_close(context, out);
        }
        let root = self.root_metadata()?;
        let aliases = AliasTable::new(root);
        scoped(context, &aliases, false, |context| {
            self.write_ordering(writer, context, out, self.ordering())?;
            self.write_paging(writer, context, out);
            Ok(())
        })
    }

    /// `core_only` leaves ordering and paging to the enclosing compound statement.
    fn write_select(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
        core_only: bool,
    ) -> Result<()> {
        let graph = self.include_graph()?;
        if !graph.is_empty() && !self.group_by.is_empty() {
            return Err(OrmError::NotSupported("include combined with group by".into()).into());
        }
        let ordering = if core_only {
            Ordering::Unordered
        } else {
            self.ordering()
        };
        let root = &graph.aliases.entries[0];
        scoped(context, &graph.aliases, true, |context| {
            out.push_str("SELECT ");
            if self.distinct {
                out.push_str("DISTINCT ");
            }
            self.write_select_list(writer, context, out, &graph)?;
            out.push_str("\nFROM ");
            if !graph.is_empty() && self.is_paged() && !core_only {
                // Page the parents, then join the children
                out.push('(');
                self.write_root_rows(writer, context, out, &graph)?;
                out.push_str(") ");
                out.push_str(&root.alias);
                graph.write_joins(writer, context, out, false);
                self.write_ordering(writer, context, out, ordering)?;
                return Ok(());
            }
            writer.write_table_ref(context, out, root.metadata, Some(&root.alias));
            graph.write_joins(writer, context, out, false);
            self.write_raw_joins(writer, context, out)?;
            self.write_where(writer, context, out)?;
            self.write_group_by(writer, context, out)?;
            self.write_having(writer, context, out)?;
            self.write_ordering(writer, context, out, ordering)?;
            if !core_only {
                self.write_paging(writer, context, out);
            }
            Ok(())
        })
    }

    /// `SELECT t0.*` filtered through the joins that keep one row per root entity, paged when
    /// the plan is.
    fn write_root_rows(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
        graph: &IncludeGraph,
    ) -> Result<()> {
        let root = &graph.aliases.entries[0];
        scoped(context, &graph.to_one_aliases(), true, |context| {
            out.push_str("SELECT ");
            out.push_str(&root.alias);
            out.push_str(".*\nFROM ");
            writer.write_table_ref(context, out, root.metadata, Some(&root.alias));
            graph.write_joins(writer, context, out, true);
            self.write_raw_joins(writer, context, out)?;
            self.write_where(writer, context, out)?;
            if self.is_paged() {
                self.write_ordering(writer, context, out, self.ordering())?;
                self.write_paging(writer, context, out);
            }
            Ok(())
        })
    }

    fn write_select_list(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
        graph: &IncludeGraph,
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlSelect);
        if !self.projection.is_empty() {
            for (i, projection) in self.projection.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match &projection.source {
                    ProjectionSource::Expr(expression) => {
                        writer.write_expression(&mut context, out, expression)?
                    }
                    ProjectionSource::Raw(raw) => raw.write(writer, &mut context, out)?,
                }
                if let Some(alias) = &projection.alias {
                    out.push_str(" AS ");
                    writer.write_identifier_quoted(&mut context, out, alias);
                }
            }
        } else if graph.is_empty() {
            let root = &graph.aliases.entries[0];
            separated_by(
                out,
                &root.metadata.columns,
                |out, column| {
                    writer.write_column_ref(&mut context, out, Some(&root.alias), column.name)
                },
                ", ",
            );
        } else {
            graph.write_columns(writer, &mut context, out);
        }
        for window in &self.windows {
            out.push_str(", ");
            writer.write_window_function(&mut context, out, window)?;
            if !window.alias.is_empty() {
                out.push_str(" AS ");
                writer.write_identifier_quoted(&mut context, out, &window.alias);
            }
        }
        Ok(())
    }

    fn write_raw_joins(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlJoin);
        for join in &self.joins {
            out.push('\n');
            join.write(writer, &mut context, out)?;
        }
        Ok(())
    }

    fn write_where(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        if self.filters.is_empty() {
            return Ok(());
        }
        out.push_str("\nWHERE ");
        let mut context = context.switch_fragment(Fragment::SqlSelectWhere);
        let many = self.filters.len() > 1;
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                out.push_str(" AND ");
            }
            match filter {
                Filter::Expr(expression) => possibly_parenthesized!(
                    out,
                    many && expression.precedence(writer) < 200,
                    writer.write_expression(&mut context, out, expression)?
                ),
                Filter::Raw(raw) => {
                    possibly_parenthesized!(out, many, raw.write(writer, &mut context, out)?)
                }
            }
        }
        Ok(())
    }

    fn write_group_by(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        if self.group_by.is_empty() {
            return Ok(());
        }
        out.push_str("\nGROUP BY ");
        let mut context = context.switch_fragment(Fragment::SqlSelectGroupBy);
        for (i, expression) in self.group_by.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            writer.write_expression(&mut context, out, expression)?;
        }
        Ok(())
    }

    fn write_having(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
    ) -> Result<()> {
        if self.having.is_empty() {
            return Ok(());
        }
        out.push_str("\nHAVING ");
        let mut context = context.switch_fragment(Fragment::SqlSelectHaving);
        let many = self.having.len() > 1;
        for (i, expression) in self.having.iter().enumerate() {
            if i > 0 {
                out.push_str(" AND ");
            }
            possibly_parenthesized!(
                out,
                many && expression.precedence(writer) < 200,
                writer.write_expression(&mut context, out, expression)?
            );
        }
        Ok(())
    }

    /// Paging without an explicit order falls back to the primary key, or to the first
    /// selected column when the rows are grouped or projected.
    fn ordering(&self) -> Ordering<'_> {
        if !self.order_by.is_empty() {
            Ordering::Explicit(&self.order_by)
        } else if !self.is_paged() {
            Ordering::Unordered
        } else if !self.group_by.is_empty() || !self.projection.is_empty() {
            Ordering::Ordinal
        } else {
            Ordering::PrimaryKey
        }
    }

    fn write_ordering(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
        ordering: Ordering,
    ) -> Result<()> {
        let mut context = context.switch_fragment(Fragment::SqlSelectOrderBy);
        match ordering {
            Ordering::Unordered => {}
            Ordering::Explicit(list) => {
                out.push_str("\nORDER BY ");
                for (i, ordered) in list.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    writer.write_expression_ordered(&mut context, out, ordered)?;
                }
            }
            Ordering::PrimaryKey => {
                let Some(root) = context.aliases.and_then(|v| v.root()) else {
                    return Err(OrmError::Translation("no root alias registered".into()).into());
                };
                let (alias, column) = (root.alias.clone(), root.metadata.primary_key().name);
                out.push_str("\nORDER BY ");
                writer.write_column_ref(&mut context, out, Some(&alias), column);
                out.push_str(" ASC");
            }
            Ordering::Ordinal => out.push_str("\nORDER BY 1 ASC"),
        }
        Ok(())
    }

    fn write_paging(&self, writer: &dyn SqlWriter, context: &mut Context, out: &mut String) {
        if self.is_paged() {
            writer.write_limit_offset(context, out, self.take, self.skip);
        }
    }
}

/// Run `f` with a context resolving members through `aliases`, parameters keep numbering.
fn scoped<R>(
    context: &mut Context,
    aliases: &AliasTable,
    qualify_columns: bool,
    f: impl FnOnce(&mut Context) -> Result<R>,
) -> Result<R> {
    let mut inner = Context::new(context.fragment, qualify_columns).with_aliases(aliases);
    inner.params = std::mem::take(&mut context.params);
    let result = f(&mut inner);
    context.params = inner.params;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ColumnDef, ColumnType, EntityDef, Navigation, NavigationKind, PostgresSqlWriter,
        SqliteSqlWriter, Value, col,
    };
    use std::sync::LazyLock;

    static BOOKS: LazyLock<EntityMetadata> = LazyLock::new(|| {
        let mut def = EntityDef::new("books")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("author_id", ColumnType::Int64))
            .column(ColumnDef::new("title", ColumnType::Varchar));
        def.navigations.push(Navigation {
            name: "author",
            kind: NavigationKind::BelongsTo,
            target: authors,
            foreign_key: "author_id",
        });
        EntityMetadata::build("Book", def).expect("valid mapping")
    });

    static AUTHORS: LazyLock<EntityMetadata> = LazyLock::new(|| {
        let mut def = EntityDef::new("authors")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("name", ColumnType::Varchar));
        def.navigations.push(Navigation {
            name: "books",
            kind: NavigationKind::HasMany,
            target: books,
            foreign_key: "author_id",
        });
        EntityMetadata::build("Author", def).expect("valid mapping")
    });

    fn books() -> Result<&'static EntityMetadata> {
        Ok(&*BOOKS)
    }

    fn authors() -> Result<&'static EntityMetadata> {
        Ok(&*AUTHORS)
    }

    #[test]
    fn filters_order_and_paging() {
        let mut plan = QueryPlan::new(authors);
        plan.filters
            .push(Filter::Expr(col("name").eq("Ann").or(col("id").gt(3))));
        plan.filters.push(Filter::Expr(col("id").lt(100)));
        plan.take = Some(10);
        let query = plan.build_sql(&PostgresSqlWriter::default()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT t0.\"id\", t0.\"name\"\nFROM \"authors\" t0\nWHERE (t0.\"name\" = $1 OR t0.\"id\" > $2) AND t0.\"id\" < $3\nORDER BY t0.\"id\" ASC\nLIMIT 10;"
        );
        assert_eq!(query.params.len(), 3);
        assert_eq!(
            query,
            plan.build_sql(&PostgresSqlWriter::default()).unwrap()
        );
    }

    #[test]
    fn include_with_paging_pages_parents() {
        let mut plan = QueryPlan::new(authors);
        plan.includes.push(vec!["books".into()]);
        plan.skip = Some(2);
        plan.take = Some(2);
        let query = plan.build_sql(&SqliteSqlWriter::default()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT t0.\"id\" AS \"t0__id\", t0.\"name\" AS \"t0__name\", t1.\"id\" AS \"t1__id\", t1.\"author_id\" AS \"t1__author_id\", t1.\"title\" AS \"t1__title\"\n\
             FROM (SELECT t0.*\nFROM \"authors\" t0\nORDER BY t0.\"id\" ASC\nLIMIT 2 OFFSET 2) t0\n\
             LEFT JOIN \"books\" t1 ON t1.\"author_id\" = t0.\"id\"\nORDER BY t0.\"id\" ASC;"
        );
    }

    #[test]
    fn unknown_include_is_invalid() {
        let mut plan = QueryPlan::new(authors);
        plan.includes.push(vec!["reviews".into()]);
        let error = plan.build_sql(&SqliteSqlWriter::default()).unwrap_err();
        assert!(matches!(
            OrmError::kind_of(&error),
            Some(OrmError::InvalidOperation(..))
        ));
    }

    #[test]
    fn count_wraps_the_query() {
        let mut plan = QueryPlan::new(authors);
        plan.filters
            .push(Filter::Raw(RawSql::new("length(name) > ?", [Value::Int32(Some(3))])));
        plan.order_by.push(col("name").asc());
        let query = plan.build_count_sql(&SqliteSqlWriter::default()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*) FROM (SELECT t0.\"id\", t0.\"name\"\nFROM \"authors\" t0\nWHERE length(name) > ?) q;"
        );
    }

    #[test]
    fn count_keeps_joins_used_by_filters() {
        let mut plan = QueryPlan::new(books);
        plan.includes.push(vec!["author".into()]);
        plan.filters.push(Filter::Expr(col("author.name").eq("Ann")));
        let query = plan.build_count_sql(&SqliteSqlWriter::default()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*) FROM (SELECT t0.*\nFROM \"books\" t0\nLEFT JOIN \"authors\" t1 ON t1.\"id\" = t0.\"author_id\"\nWHERE t1.\"name\" = ?) q;"
        );
        assert_eq!(query.params, [Value::Varchar(Some("Ann".into()))]);

        let mut plan = QueryPlan::new(authors);
        plan.includes.push(vec!["books".into()]);
        let query = plan.build_count_sql(&SqliteSqlWriter::default()).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*) FROM (SELECT t0.*\nFROM \"authors\" t0) q;"
        );
    }
}
