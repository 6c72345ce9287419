mod batch;
mod concurrency;

pub use batch::*;
pub use concurrency::*;

use crate::{
    Driver, Entity, EntityMetadata, Executor, Expr, Filter, OrmError, Query, QueryPlan, Result, Row,
    RowLabeled, SqlWriter, Value, metadata::VersionColumnInfo,
    stream::TryStreamExt,
    writer::{Context, Fragment},
};

fn statement(write: impl FnOnce(&mut Context, &mut String) -> Result<()>) -> Result<Query> {
    let mut context = Context::new(Fragment::None, false);
    let mut out = String::with_capacity(128);
    write(&mut context, &mut out)?;
    let query = Query::new(out, context.params);
    log::debug!("{query}");
    Ok(query)
}

fn member(name: &str) -> Expr {
    Expr::Member(vec![name.to_string()])
}

fn key_condition(metadata: &EntityMetadata, key: &Value) -> Expr {
    member(metadata.primary_key().name).eq(Expr::Constant(key.clone()))
}

fn versioned_condition(
    metadata: &EntityMetadata,
    key: &Value,
    version: VersionColumnInfo,
    expected: &Value,
) -> Expr {
    key_condition(metadata, key)
        .and(member(metadata.columns[version.index].name).eq(Expr::Constant(expected.clone())))
}

fn values_of<E: Entity>(metadata: &EntityMetadata, entity: &E) -> Result<Row> {
    let values = entity.values();
    if values.len() != metadata.columns.len() {
        return Err(OrmError::Configuration {
            entity: metadata.type_name.into(),
            message: format!(
                "values() returned {} cells for {} mapped columns",
                values.len(),
                metadata.columns.len()
            ),
        }
        .into());
    }
    Ok(values)
}

fn existing_key(metadata: &EntityMetadata, values: &Row) -> Result<Value> {
    let key = values[metadata.primary_key].clone();
    if key.is_null() {
        return Err(OrmError::InvalidOperation(format!(
            "`{}` has no primary key value",
            metadata.type_name
        ))
        .into());
    }
    Ok(key)
}

/// Columns written by INSERT, the generated key is left to the database.
fn insert_columns(metadata: &EntityMetadata) -> Vec<usize> {
    (0..metadata.columns.len())
        .filter(|i| *i != metadata.primary_key || !metadata.primary_key().auto_increment)
        .collect()
}

fn assignments(metadata: &EntityMetadata, values: &Row) -> Vec<(usize, Value)> {
    values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != metadata.primary_key)
        .map(|(i, v)| (i, v.clone()))
        .collect()
}

/// Stored cells in column order.
fn stored_values(metadata: &EntityMetadata, row: &RowLabeled) -> Result<Row> {
    metadata
        .columns
        .iter()
        .map(|column| {
            row.get_column_ignore_case(column.name)
                .cloned()
                .ok_or_else(|| {
                    OrmError::InvalidOperation(format!(
                        "column `{}` is missing from the stored row",
                        column.name
                    ))
                    .into()
                })
        })
        .collect()
}

async fn load_row<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    key: &Value,
) -> Result<Option<RowLabeled>> {
    let metadata = E::metadata()?;
    let mut plan = QueryPlan::of::<E>();
    plan.filters.push(Filter::Expr(key_condition(metadata, key)));
    let query = plan.build_sql(executor.driver().sql_writer().as_dyn())?;
    log::debug!("{query}");
    let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
    Ok(rows.into_iter().next())
}

async fn write_update<Exec: Executor>(
    executor: &mut Exec,
    metadata: &EntityMetadata,
    assignments: &[(usize, Value)],
    condition: &Expr,
) -> Result<u64> {
    let writer = executor.driver().sql_writer();
    let query = statement(|context, out| {
        writer.write_update(context, out, metadata, assignments, condition)
    })?;
    Ok(executor.execute(query).await?.rows_affected)
}

pub(crate) async fn find<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    key: Value,
) -> Result<Option<E>> {
    let metadata = E::metadata()?;
    E::query()
        .where_(key_condition(metadata, &key))
        .first(executor)
        .await
}

pub(crate) async fn create<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entity: &mut E,
) -> Result<()> {
    let metadata = E::metadata()?;
    if let Some(version) = metadata.version {
        let column = &metadata.columns[version.index];
        entity.set_value(
            column.name,
            initial_version(version.kind, column.column_type),
        )?;
    }
    let values = values_of(metadata, entity)?;
    let columns = insert_columns(metadata);
    let generated = metadata.primary_key().auto_increment;
    let writer = executor.driver().sql_writer();
    let returning = generated && writer.supports_returning();
    let query = statement(|context, out| {
        writer.write_insert(context, out, metadata, &columns, &[values], returning);
        Ok(())
    })?;
    if !generated {
        executor.execute(query).await?;
        return Ok(());
    }
    let key = if returning {
        let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
        rows.into_iter().next().and_then(|v| v.values.into_vec().into_iter().next())
    } else {
        executor
            .execute(query)
            .await?
            .last_affected_id
            .map(|v| Value::Int64(Some(v)))
    };
    let Some(key) = key else {
        return Err(OrmError::InvalidOperation(format!(
            "the database did not report the key generated for `{}`",
            metadata.table
        ))
        .into());
    };
    entity.set_value(metadata.primary_key().name, key)
}

/// Multi-row inserts, generated keys are not read back.
pub(crate) async fn create_many<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entities: &mut [E],
    configuration: BatchInsertConfiguration,
) -> Result<u64> {
    let metadata = E::metadata()?;
    if let Some(version) = metadata.version {
        let column = &metadata.columns[version.index];
        for entity in entities.iter_mut() {
            entity.set_value(
                column.name,
                initial_version(version.kind, column.column_type),
            )?;
        }
    }
    let columns = insert_columns(metadata);
    let writer = executor.driver().sql_writer();
    let chunk = configuration.rows_per_statement(columns.len(), writer.as_dyn());
    log::debug!(
        "Inserting {} rows into {} by {chunk}",
        entities.len(),
        metadata.table
    );
    let mut total = 0;
    for entities in entities.chunks(chunk) {
        let rows = entities
            .iter()
            .map(|v| values_of(metadata, v))
            .collect::<Result<Vec<_>>>()?;
        let query = statement(|context, out| {
            writer.write_insert(context, out, metadata, &columns, &rows, false);
            Ok(())
        })?
        .reuse(configuration.enable_prepared_statement_reuse);
        total += executor.execute(query).await?.rows_affected;
    }
    Ok(total)
}

/// Without a version column a missed key is reported as not found. With one, zero affected
/// rows trigger a lookup: a missing row is not found, a present row is a conflict handed to
/// `resolution` or reported.
pub(crate) async fn update<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entity: &mut E,
    resolution: Option<ConflictResolution>,
) -> Result<()> {
    let metadata = E::metadata()?;
    let values = values_of(metadata, entity)?;
    let key = existing_key(metadata, &values)?;
    let Some(version) = metadata.version else {
        let affected = write_update(
            executor,
            metadata,
            &assignments(metadata, &values),
            &key_condition(metadata, &key),
        )
        .await?;
        if affected == 0 {
            return Err(OrmError::not_found(metadata.table, &key).into());
        }
        return Ok(());
    };
    let column = &metadata.columns[version.index];
    let expected = values[version.index].clone();
    let next = next_version(version.kind, column.column_type, &expected)?;
    let mut updated = values.clone();
    updated[version.index] = next.clone();
    let affected = write_update(
        executor,
        metadata,
        &assignments(metadata, &updated),
        &versioned_condition(metadata, &key, version, &expected),
    )
    .await?;
    if affected > 0 {
        return entity.set_value(column.name, next);
    }
    let Some(stored) = load_row::<E, Exec>(executor, &key).await? else {
        return Err(OrmError::not_found(metadata.table, &key).into());
    };
    let stored = stored_values(metadata, &stored)?;
    let found = stored[version.index].clone();
    let conflict = OrmError::concurrency(
        metadata.table,
        &key,
        format!("expected version {expected}, the stored version is {found}"),
    );
    let Some(resolution) = resolution else {
        log::debug!("{conflict}");
        return Err(conflict.into());
    };
    log::debug!("Resolving with {resolution:?}: {conflict}");
    let next = next_version(version.kind, column.column_type, &found)?;
    let (mut resolved, condition) = match resolution {
        ConflictResolution::ClientWins => (values, key_condition(metadata, &key)),
        ConflictResolution::DatabaseWins => (
            stored.clone(),
            versioned_condition(metadata, &key, version, &found),
        ),
        ConflictResolution::MergeChanges => (
            merge_values(&stored, &values, &stored),
            versioned_condition(metadata, &key, version, &found),
        ),
    };
    resolved[version.index] = next;
    let affected = write_update(
        executor,
        metadata,
        &assignments(metadata, &resolved),
        &condition,
    )
    .await?;
    if affected == 0 {
        return Err(match resolution {
            ConflictResolution::ClientWins => OrmError::not_found(metadata.table, &key),
            _ => OrmError::concurrency(
                metadata.table,
                &key,
                format!("the row changed again while resolving with {resolution:?}"),
            ),
        }
        .into());
    }
    for (column, value) in metadata.columns.iter().zip(resolved) {
        entity.set_value(column.name, value)?;
    }
    Ok(())
}

/// A versioned entity matching no row is a conflict, whether the row changed or is gone.
pub(crate) async fn delete<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entity: &E,
) -> Result<()> {
    let metadata = E::metadata()?;
    let values = values_of(metadata, entity)?;
    let key = existing_key(metadata, &values)?;
    let condition = match metadata.version {
        Some(version) => versioned_condition(metadata, &key, version, &values[version.index]),
        None => key_condition(metadata, &key),
    };
    let writer = executor.driver().sql_writer();
    let query = statement(|context, out| writer.write_delete(context, out, metadata, &condition))?;
    let affected = executor.execute(query).await?.rows_affected;
    if affected > 0 {
        return Ok(());
    }
    Err(match metadata.version {
        Some(..) => OrmError::concurrency(
            metadata.table,
            &key,
            "the row was changed or deleted by someone else",
        ),
        None => OrmError::not_found(metadata.table, &key),
    }
    .into())
}

/// Rows carrying the next version, computed client side for both the insert and the update.
fn upsert_row(metadata: &EntityMetadata, values: &Row) -> Result<(Row, Option<Value>)> {
    let Some(version) = metadata.version else {
        return Ok((values.clone(), None));
    };
    let column = &metadata.columns[version.index];
    let next = next_version(version.kind, column.column_type, &values[version.index])?;
    let mut row = values.clone();
    row[version.index] = next.clone();
    Ok((row, Some(next)))
}

fn needs_generated_key(metadata: &EntityMetadata, values: &Row) -> bool {
    metadata.primary_key().auto_increment && values[metadata.primary_key].is_null()
}

/// Column indexes of the conflict target, the primary key when none is named.
fn conflict_target(metadata: &EntityMetadata, names: &[&str]) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Ok(vec![metadata.primary_key]);
    }
    names
        .iter()
        .map(|name| {
            metadata.column_index(name).ok_or_else(|| {
                OrmError::InvalidOperation(format!(
                    "cannot upsert on `{name}`: `{}` has no such column",
                    metadata.type_name
                ))
                .into()
            })
        })
        .collect()
}

/// Last writer wins, the version is not checked. A key left to the database is read back
/// through the conflict columns.
pub(crate) async fn upsert<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entity: &mut E,
    conflict_columns: &[&str],
) -> Result<()> {
    let metadata = E::metadata()?;
    let conflict = conflict_target(metadata, conflict_columns)?;
    let values = values_of(metadata, entity)?;
    let generated = needs_generated_key(metadata, &values);
    if generated && conflict.contains(&metadata.primary_key) {
        return create(executor, entity).await;
    }
    let (row, version) = upsert_row(metadata, &values)?;
    let columns: Vec<usize> = if generated {
        insert_columns(metadata)
    } else {
        (0..metadata.columns.len()).collect()
    };
    let writer = executor.driver().sql_writer();
    let query = statement(|context, out| {
        writer.write_upsert(context, out, metadata, &columns, &conflict, &[row.clone()]);
        Ok(())
    })?;
    executor.execute(query).await?;
    if generated {
        let mut plan = QueryPlan::of::<E>();
        for i in &conflict {
            plan.filters.push(Filter::Expr(
                member(metadata.columns[*i].name).eq(Expr::Constant(row[*i].clone())),
            ));
        }
        let query = plan.build_sql(writer.as_dyn())?;
        log::debug!("{query}");
        let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
        let Some(key) = rows
            .first()
            .and_then(|v| v.get_column_ignore_case(metadata.primary_key().name))
            .cloned()
        else {
            return Err(OrmError::InvalidOperation(format!(
                "the upserted row of `{}` was not found through its conflict columns",
                metadata.table
            ))
            .into());
        };
        entity.set_value(metadata.primary_key().name, key)?;
    }
    if let (Some(info), Some(version)) = (metadata.version, version) {
        entity.set_value(metadata.columns[info.index].name, version)?;
    }
    Ok(())
}

/// Returns the number of entities written. Entities still waiting for a generated key are
/// written one by one.
pub(crate) async fn upsert_many<E: Entity, Exec: Executor>(
    executor: &mut Exec,
    entities: &mut [E],
    conflict_columns: &[&str],
    configuration: BatchInsertConfiguration,
) -> Result<u64> {
    let metadata = E::metadata()?;
    let conflict = conflict_target(metadata, conflict_columns)?;
    let mut keyed = Vec::with_capacity(entities.len());
    let mut rows = Vec::with_capacity(entities.len());
    let mut versions = Vec::with_capacity(entities.len());
    for (i, entity) in entities.iter_mut().enumerate() {
        let values = values_of(metadata, entity)?;
        if needs_generated_key(metadata, &values) {
            upsert(executor, entity, conflict_columns).await?;
            continue;
        }
        let (row, version) = upsert_row(metadata, &values)?;
        keyed.push(i);
        rows.push(row);
        versions.push(version);
    }
    let columns: Vec<usize> = (0..metadata.columns.len()).collect();
    let writer = executor.driver().sql_writer();
    let chunk = configuration.rows_per_statement(columns.len(), writer.as_dyn());
    for rows in rows.chunks(chunk) {
        let query = statement(|context, out| {
            writer.write_upsert(context, out, metadata, &columns, &conflict, rows);
            Ok(())
        })?
        .reuse(configuration.enable_prepared_statement_reuse);
        executor.execute(query).await?;
    }
    if let Some(info) = metadata.version {
        for (i, version) in keyed.into_iter().zip(versions) {
            if let Some(version) = version {
                entities[i].set_value(metadata.columns[info.index].name, version)?;
            }
        }
    }
    Ok(entities.len() as u64)
}
