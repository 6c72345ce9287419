use crate::{
    AsValue, BatchInsertConfiguration, ConflictResolution, EntityDef, EntityMetadata, Executor,
    OrmError, QueryBuilder, Result, Row, RowLabeled, Value, metadata_of, mutation,
};
use anyhow::Context;
use std::future::Future;

/// A record mapped to a table.
///
/// The mapping is declared once by [`Entity::describe`]; the other required methods are the
/// field accessors the engine uses instead of reflection. `values` returns the cells in the
/// order of the declared columns.
///
/// ```rust
/// use quarry_core::*;
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn describe() -> EntityDef {
///         EntityDef::new("tags")
///             .column(ColumnDef::new("id", ColumnType::Int64).primary_key().auto_increment())
///             .column(ColumnDef::new("label", ColumnType::Varchar).max_length(40))
///     }
///     fn values(&self) -> Row {
///         [self.id.as_value(), self.label.clone().as_value()].into()
///     }
///     fn from_row(row: &RowLabeled) -> Result<Self> {
///         Ok(Self {
///             id: row.read("id")?,
///             label: row.read("label")?,
///         })
///     }
///     fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
///         match column {
///             "id" => self.id = AsValue::try_from_value(value)?,
///             "label" => self.label = AsValue::try_from_value(value)?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Sized + 'static {
    fn describe() -> EntityDef;

    fn values(&self) -> Row;

    fn from_row(row: &RowLabeled) -> Result<Self>;

    /// Store a value by column name: generated keys, versions and rows loaded by a resolver.
    fn set_value(&mut self, column: &str, value: Value) -> Result<()>;

    /// Receive the entities loaded by an include of `navigation`.
    fn attach(&mut self, navigation: &str, related: Vec<EntityNode>) -> Result<()> {
        let _ = related;
        Err(OrmError::InvalidOperation(format!(
            "`{}` does not accept the included navigation `{navigation}`",
            std::any::type_name::<Self>()
        ))
        .into())
    }

    fn metadata() -> Result<&'static EntityMetadata> {
        metadata_of::<Self>()
    }

    fn from_node(node: EntityNode) -> Result<Self> {
        let mut entity = Self::from_row(&node.row)?;
        for (navigation, related) in node.related {
            entity.attach(navigation, related)?;
        }
        Ok(entity)
    }

    fn query() -> QueryBuilder<Self> {
        QueryBuilder::new()
    }

    fn primary_key_value(&self) -> Result<Value> {
        let metadata = Self::metadata()?;
        self.values()
            .into_vec()
            .into_iter()
            .nth(metadata.primary_key)
            .ok_or_else(|| {
                OrmError::Configuration {
                    entity: metadata.type_name.into(),
                    message: "values() returned fewer cells than mapped columns".into(),
                }
                .into()
            })
    }

    fn find<Exec: Executor>(
        executor: &mut Exec,
        key: impl AsValue + Send,
    ) -> impl Future<Output = Result<Option<Self>>> + Send {
        mutation::find::<Self, Exec>(executor, key.as_value())
    }

    fn count<Exec: Executor>(executor: &mut Exec) -> impl Future<Output = Result<u64>> + Send {
        async move { Self::query().count(executor).await }
    }

    fn create<Exec: Executor>(
        &mut self,
        executor: &mut Exec,
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::create(executor, self)
    }

    fn create_many<Exec: Executor>(
        executor: &mut Exec,
        entities: &mut [Self],
        configuration: BatchInsertConfiguration,
    ) -> impl Future<Output = Result<u64>> + Send {
        mutation::create_many(executor, entities, configuration)
    }

    fn update<Exec: Executor>(
        &mut self,
        executor: &mut Exec,
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::update(executor, self, None)
    }

    fn update_resolving<Exec: Executor>(
        &mut self,
        executor: &mut Exec,
        resolution: ConflictResolution,
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::update(executor, self, Some(resolution))
    }

    fn delete<Exec: Executor>(
        &self,
        executor: &mut Exec,
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::delete(executor, self)
    }

    /// Insert, or overwrite the row with the same primary key.
    fn upsert<Exec: Executor>(
        &mut self,
        executor: &mut Exec,
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::upsert(executor, self, &[])
    }

    /// Insert, or overwrite the row matching on `conflict_columns` (a unique key).
    fn upsert_on<Exec: Executor>(
        &mut self,
        executor: &mut Exec,
        conflict_columns: &[&str],
    ) -> impl Future<Output = Result<()>> + Send {
        mutation::upsert(executor, self, conflict_columns)
    }

    fn upsert_many<Exec: Executor>(
        executor: &mut Exec,
        entities: &mut [Self],
        configuration: BatchInsertConfiguration,
    ) -> impl Future<Output = Result<u64>> + Send {
        mutation::upsert_many(executor, entities, &[], configuration)
    }

    fn upsert_many_on<Exec: Executor>(
        executor: &mut Exec,
        entities: &mut [Self],
        conflict_columns: &[&str],
        configuration: BatchInsertConfiguration,
    ) -> impl Future<Output = Result<u64>> + Send {
        mutation::upsert_many(executor, entities, conflict_columns, configuration)
    }
}

/// Row of an entity together with the rows loaded through its included navigations.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub row: RowLabeled,
    pub related: Vec<(&'static str, Vec<EntityNode>)>,
}

impl EntityNode {
    pub fn related(&self, navigation: &str) -> &[EntityNode] {
        self.related
            .iter()
            .find(|(name, _)| *name == navigation)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or_default()
    }

    pub fn into_entity<E: Entity>(self) -> Result<E> {
        E::from_node(self)
    }
}

impl RowLabeled {
    /// Typed cell lookup by label, ignoring case.
    pub fn read<T: AsValue>(&self, column: &str) -> Result<T> {
        let Some(value) = self.get_column_ignore_case(column) else {
            return Err(anyhow::anyhow!(
                "column `{column}` is not present in the row ({})",
                self.labels.join(", ")
            ));
        };
        T::try_from_value(value.clone()).with_context(|| format!("While reading column `{column}`"))
    }
}
