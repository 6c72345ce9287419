use crate::{ColumnDef, ColumnMapping, Entity, OrmError, Result, VersionKind};
use std::{
    any::{TypeId, type_name},
    collections::{HashMap, HashSet},
    sync::{LazyLock, RwLock},
};

/// Mapping declaration of an entity, produced by [`Entity::describe`].
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub table: &'static str,
    pub schema: Option<&'static str>,
    pub columns: Vec<ColumnDef>,
    pub navigations: Vec<Navigation>,
}

impl EntityDef {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            schema: None,
            columns: Vec::new(),
            navigations: Vec::new(),
        }
    }
    pub fn schema(mut self, schema: &'static str) -> Self {
        self.schema = Some(schema);
        self
    }
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }
    /// Collection navigation: `Child.foreign_key` references this entity's primary key.
    pub fn has_many<Child: Entity>(
        mut self,
        navigation: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.navigations.push(Navigation {
            name: navigation,
            kind: NavigationKind::HasMany,
            target: metadata_of::<Child>,
            foreign_key,
        });
        self
    }
    /// Reference navigation: this entity's `foreign_key` references `Parent`'s primary key.
    pub fn belongs_to<Parent: Entity>(
        mut self,
        navigation: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.navigations.push(Navigation {
            name: navigation,
            kind: NavigationKind::BelongsTo,
            target: metadata_of::<Parent>,
            foreign_key,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    HasMany,
    BelongsTo,
}

#[derive(Debug, Clone)]
pub struct Navigation {
    pub name: &'static str,
    pub kind: NavigationKind,
    /// Resolved lazily, mutually referencing entities would otherwise recurse.
    pub target: fn() -> Result<&'static EntityMetadata>,
    pub foreign_key: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionColumnInfo {
    pub index: usize,
    pub kind: VersionKind,
}

#[derive(Debug)]
pub struct EntityMetadata {
    pub type_name: &'static str,
    pub table: &'static str,
    pub schema: Option<&'static str>,
    pub columns: Vec<ColumnMapping>,
    pub primary_key: usize,
    pub version: Option<VersionColumnInfo>,
    pub navigations: Vec<Navigation>,
}

impl EntityMetadata {
    /// Validate a declaration.
    pub fn build(type_name: &'static str, def: EntityDef) -> Result<Self> {
        let error = |message: String| OrmError::Configuration {
            entity: type_name.into(),
            message,
        };
        if def.columns.is_empty() {
            return Err(error("no columns are mapped".into()).into());
        }
        let columns: Vec<ColumnMapping> = def.columns.iter().map(Into::into).collect();
        let mut names = HashSet::new();
        for column in &columns {
            if !names.insert(column.name) {
                return Err(error(format!(
                    "more than one field maps to column `{}`",
                    column.name
                ))
                .into());
            }
        }
        let keys: Vec<_> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [key] => *key,
            [] => return Err(error("no primary key is declared".into()).into()),
            _ => {
                return Err(error(format!(
                    "{} primary keys are declared, exactly one is required",
                    keys.len()
                ))
                .into());
            }
        };
        let mut version = None;
        for (index, def) in def.columns.iter().enumerate() {
            let Some(kind) = def.version else {
                continue;
            };
            if version.is_some() {
                return Err(error("more than one version column is declared".into()).into());
            }
            if index == primary_key {
                return Err(error("the primary key cannot be the version column".into()).into());
            }
            if !def.column_type.supports_version(kind) {
                return Err(error(format!(
                    "column `{}` of type {:?} cannot hold a {kind:?} version",
                    columns[index].name, def.column_type
                ))
                .into());
            }
            version = Some(VersionColumnInfo { index, kind });
        }
        let mut navigations = HashSet::new();
        for navigation in &def.navigations {
            if !navigations.insert(navigation.name) {
                return Err(error(format!(
                    "navigation `{}` is declared twice",
                    navigation.name
                ))
                .into());
            }
        }
        Ok(Self {
            type_name,
            table: def.table,
            schema: def.schema,
            columns,
            primary_key,
            version,
            navigations: def.navigations,
        })
    }

    pub fn primary_key(&self) -> &ColumnMapping {
        &self.columns[self.primary_key]
    }

    pub fn version_column(&self) -> Option<&ColumnMapping> {
        self.version.map(|v| &self.columns[v.index])
    }

    /// Index of a column, looked up by column name first, then by field name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.field == name))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMapping> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.iter().find(|v| v.name == name)
    }
}

static METADATA: LazyLock<RwLock<HashMap<TypeId, &'static EntityMetadata>>> =
    LazyLock::new(Default::default);

/// Metadata of `E`, built and validated on first use then cached for the process lifetime.
///
/// Failed builds are not cached, every call reports the configuration error again.
pub fn metadata_of<E: Entity>() -> Result<&'static EntityMetadata> {
    let id = TypeId::of::<E>();
    if let Ok(cache) = METADATA.read()
        && let Some(found) = cache.get(&id)
    {
        return Ok(found);
    }
    let built = EntityMetadata::build(type_name::<E>(), E::describe())?;
    let mut cache = METADATA.write().unwrap_or_else(|e| e.into_inner());
    let result = *cache
        .entry(id)
        .or_insert_with(|| Box::leak(Box::new(built)));
    log::trace!("Resolved metadata of {} ({})", result.type_name, result.table);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnType, OrmError};

    fn def() -> EntityDef {
        EntityDef::new("items")
            .column(ColumnDef::new("id", ColumnType::Int64).primary_key())
            .column(ColumnDef::new("name", ColumnType::Varchar))
    }

    fn configuration_error(def: EntityDef) -> String {
        let error = EntityMetadata::build("Item", def).unwrap_err();
        match OrmError::kind_of(&error) {
            Some(OrmError::Configuration { message, .. }) => message.clone(),
            other => panic!("Unexpected error {other:?}"),
        }
    }

    #[test]
    fn primary_key_rules() {
        let metadata = EntityMetadata::build("Item", def()).unwrap();
        assert_eq!(metadata.primary_key().name, "id");
        assert!(
            configuration_error(
                EntityDef::new("items").column(ColumnDef::new("name", ColumnType::Varchar))
            )
            .contains("no primary key")
        );
        assert!(
            configuration_error(
                def().column(ColumnDef::new("other", ColumnType::Int32).primary_key())
            )
            .contains("2 primary keys")
        );
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let message = configuration_error(
            def().column(ColumnDef::new("title", ColumnType::Varchar).name("name")),
        );
        assert!(message.contains("`name`"));
    }

    #[test]
    fn version_column_validation() {
        let metadata = EntityMetadata::build(
            "Item",
            def().column(
                ColumnDef::new("version", ColumnType::Int32).version(VersionKind::Integer),
            ),
        )
        .unwrap();
        assert_eq!(metadata.version_column().unwrap().name, "version");
        assert!(
            configuration_error(
                def().column(
                    ColumnDef::new("stamp", ColumnType::Varchar).version(VersionKind::Guid)
                )
            )
            .contains("cannot hold")
        );
        assert!(
            configuration_error(
                def()
                    .column(ColumnDef::new("a", ColumnType::Int32).version(VersionKind::Integer))
                    .column(ColumnDef::new("b", ColumnType::Int32).version(VersionKind::Integer))
            )
            .contains("more than one version")
        );
    }

    #[test]
    fn lookup_by_field_or_column() {
        let metadata = EntityMetadata::build(
            "Item",
            def().column(ColumnDef::new("created_at", ColumnType::Timestamp).name("created")),
        )
        .unwrap();
        assert_eq!(metadata.column_index("created"), Some(2));
        assert_eq!(metadata.column_index("created_at"), Some(2));
        assert_eq!(metadata.column_index("missing"), None);
    }
}
