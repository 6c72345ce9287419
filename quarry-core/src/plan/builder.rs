use crate::{
    Cte, Driver, Entity, Executor, Expr, Filter, FromRow, Ordered, OrmError, Projection, Query,
    QueryPlan, RawSql, Result, RowLabeled, SetOperator, SqlWriter, Value, WindowSpec,
    stream::TryStreamExt,
};
use std::{any::type_name, fmt, marker::PhantomData};

/// Fluent construction of a [`QueryPlan`] rooted at `E`.
///
/// ```rust,ignore
/// let page = Author::query()
///     .include("books")
///     .where_(col("name").starts_with("A"))
///     .order_by(col("name").asc())
///     .skip(20)
///     .take(10)
///     .fetch_all(&mut connection)
///     .await?;
/// ```
pub struct QueryBuilder<E: Entity> {
    plan: QueryPlan,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for QueryBuilder<E> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for QueryBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("entity", &type_name::<E>())
            .field("plan", &self.plan)
            .finish()
    }
}

impl<E: Entity> Default for QueryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> QueryBuilder<E> {
    pub fn new() -> Self {
        Self {
            plan: QueryPlan::of::<E>(),
            _entity: PhantomData,
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn into_plan(self) -> QueryPlan {
        self.plan
    }

    pub fn where_(mut self, predicate: Expr) -> Self {
        self.plan.filters.push(Filter::Expr(predicate));
        self
    }

    pub fn where_raw(mut self, sql: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.plan.filters.push(Filter::Raw(RawSql::new(sql, params)));
        self
    }

    /// Replace the ordering.
    pub fn order_by(mut self, ordered: impl Into<Ordered>) -> Self {
        self.plan.order_by = vec![ordered.into()];
        self
    }

    pub fn then_by(mut self, ordered: impl Into<Ordered>) -> Self {
        self.plan.order_by.push(ordered.into());
        self
    }

    pub fn skip(mut self, rows: u64) -> Self {
        self.plan.skip = Some(rows);
        self
    }

    pub fn take(mut self, rows: u64) -> Self {
        self.plan.take = Some(rows);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.plan.distinct = true;
        self
    }

    pub fn select(mut self, projection: impl IntoIterator<Item = Projection>) -> Self {
        self.plan.projection.extend(projection);
        self
    }

    pub fn select_raw(
        mut self,
        sql: &str,
        params: impl IntoIterator<Item = Value>,
        alias: Option<&str>,
    ) -> Self {
        self.plan.projection.push(Projection::raw(
            RawSql::new(sql, params),
            alias.map(Into::into),
        ));
        self
    }

    /// Eager load a navigation, `"books.publisher"` loads the intermediate levels too.
    pub fn include(mut self, navigation: &str) -> Self {
        self.plan
            .includes
            .push(navigation.split('.').map(Into::into).collect());
        self
    }

    /// Continue the path of the last include.
    pub fn then_include(mut self, navigation: &str) -> Self {
        let mut path = self.plan.includes.last().cloned().unwrap_or_default();
        path.extend(navigation.split('.').map(String::from));
        self.plan.includes.push(path);
        self
    }

    pub fn group_by(mut self, expression: Expr) -> Self {
        self.plan.group_by.push(expression);
        self
    }

    pub fn having(mut self, predicate: Expr) -> Self {
        self.plan.having.push(predicate);
        self
    }

    pub fn window(mut self, window: WindowSpec) -> Self {
        self.plan.windows.push(window);
        self
    }

    pub fn with_cte(
        mut self,
        name: &str,
        columns: &[&str],
        sql: &str,
        params: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.plan
            .ctes
            .push(Cte::raw(name, columns, RawSql::new(sql, params)));
        self
    }

    pub fn with_recursive_cte(
        mut self,
        name: &str,
        columns: &[&str],
        sql: &str,
        params: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.plan
            .ctes
            .push(Cte::raw(name, columns, RawSql::new(sql, params)).recursive());
        self
    }

    pub fn with_cte_query<T: Entity>(
        mut self,
        name: &str,
        columns: &[&str],
        query: QueryBuilder<T>,
    ) -> Self {
        self.plan.ctes.push(Cte::plan(name, columns, query.plan));
        self
    }

    /// Append `sql` after the joins of the root, `INNER JOIN tree c ON c."id" = t0."id"`.
    pub fn join_raw(mut self, sql: &str, params: impl IntoIterator<Item = Value>) -> Self {
        self.plan.joins.push(RawSql::new(sql, params));
        self
    }

    fn combine<T: Entity>(mut self, operator: SetOperator, other: QueryBuilder<T>) -> Self {
        self.plan.set_operations.push((operator, other.plan));
        self
    }

    pub fn union<T: Entity>(self, other: QueryBuilder<T>) -> Self {
        self.combine(SetOperator::Union, other)
    }

    pub fn union_all<T: Entity>(self, other: QueryBuilder<T>) -> Self {
        self.combine(SetOperator::UnionAll, other)
    }

    pub fn intersect<T: Entity>(self, other: QueryBuilder<T>) -> Self {
        self.combine(SetOperator::Intersect, other)
    }

    pub fn except<T: Entity>(self, other: QueryBuilder<T>) -> Self {
        self.combine(SetOperator::Except, other)
    }

    pub fn build_sql(&self, writer: &dyn SqlWriter) -> Result<Query> {
        self.plan.build_sql(writer)
    }

    fn query_for<Exec: Executor>(&self, executor: &Exec) -> Result<Query> {
        let writer = executor.driver().sql_writer();
        let query = self.plan.build_sql(writer.as_dyn())?;
        log::debug!("{query}");
        Ok(query)
    }

    /// Rows as returned by the database, include columns labelled `tN__column`.
    pub async fn fetch_rows<Exec: Executor>(&self, executor: &mut Exec) -> Result<Vec<RowLabeled>> {
        let query = self.query_for(executor)?;
        executor.fetch(query).try_collect().await
    }

    pub async fn fetch_all<Exec: Executor>(&self, executor: &mut Exec) -> Result<Vec<E>> {
        let rows = self.fetch_rows(executor).await?;
        if self.plan.is_graph() {
            self.plan
                .include_graph()?
                .stitch(rows)?
                .into_iter()
                .map(E::from_node)
                .collect()
        } else {
            rows.iter().map(<E as Entity>::from_row).collect()
        }
    }

    /// Includes are paged by parent, the first entity keeps all its children.
    pub async fn first<Exec: Executor>(&self, executor: &mut Exec) -> Result<Option<E>> {
        let query = if self.plan.is_paged() {
            self.clone()
        } else {
            self.clone().take(1)
        };
        Ok(query.fetch_all(executor).await?.into_iter().next())
    }

    /// Materialize every row through [`FromRow`], for projections.
    pub async fn fetch_as<T: FromRow, Exec: Executor>(
        &self,
        executor: &mut Exec,
    ) -> Result<Vec<T>> {
        self.fetch_rows(executor)
            .await?
            .iter()
            .map(T::from_labeled)
            .collect()
    }

    pub async fn count<Exec: Executor>(&self, executor: &mut Exec) -> Result<u64> {
        let writer = executor.driver().sql_writer();
        let query = self.plan.build_count_sql(writer.as_dyn())?;
        log::debug!("{query}");
        let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
        let Some(value) = rows.first().and_then(|v| v.values.first()) else {
            return Err(OrmError::InvalidOperation("COUNT(*) returned no rows".into()).into());
        };
        value.as_integer().and_then(|v| u64::try_from(v).ok()).ok_or_else(|| {
            OrmError::InvalidOperation(format!("COUNT(*) returned `{value}`")).into()
        })
    }
}
