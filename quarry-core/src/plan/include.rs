use crate::{
    AliasTable, EntityMetadata, EntityNode, Navigation, NavigationKind, OrmError, Result,
    RowLabeled, RowNames, SqlWriter, Value, separated_by,
    writer::{Context, Fragment},
};
use std::collections::HashMap;

/// LEFT JOIN bringing in one included navigation.
#[derive(Debug, Clone)]
pub(crate) struct IncludeJoin {
    /// Alias table index of the joined entity.
    pub entry: usize,
    pub parent: usize,
    pub navigation: &'static Navigation,
    /// Reached through at least one collection navigation.
    pub fans_out: bool,
}

/// Aliases and joins of the include tree, root at index 0.
#[derive(Debug, Clone)]
pub(crate) struct IncludeGraph {
    pub aliases: AliasTable,
    pub joins: Vec<IncludeJoin>,
}

impl IncludeGraph {
    pub fn resolve(root: &'static EntityMetadata, includes: &[Vec<String>]) -> Result<Self> {
        let mut graph = Self {
            aliases: AliasTable::new(root),
            joins: Vec::new(),
        };
        for path in includes {
            for depth in 1..=path.len() {
                let prefix = &path[..depth];
                if graph.aliases.find(prefix).is_some() {
                    continue;
                }
                // Shorter prefixes are registered first
                let parent = graph.aliases.position(&prefix[..depth - 1]).unwrap_or(0);
                let owner = graph.aliases.entries[parent].metadata;
                let name = &prefix[depth - 1];
                let Some(navigation) = owner.navigation(name) else {
                    return Err(OrmError::InvalidOperation(format!(
                        "cannot include `{}`: `{}` has no navigation `{name}`",
                        path.join("."),
                        owner.type_name
                    ))
                    .into());
                };
                let target = (navigation.target)()?;
                let key_owner = match navigation.kind {
                    NavigationKind::HasMany => target,
                    NavigationKind::BelongsTo => owner,
                };
                if key_owner.column(navigation.foreign_key).is_none() {
                    return Err(OrmError::InvalidOperation(format!(
                        "cannot include `{}`: `{}` has no join key column `{}`",
                        path.join("."),
                        key_owner.type_name,
                        navigation.foreign_key
                    ))
                    .into());
                }
                let fans_out = navigation.kind == NavigationKind::HasMany
                    || graph
                        .joins
                        .iter()
                        .any(|j| j.entry == parent && j.fans_out);
                graph.aliases.register(prefix.to_vec(), target);
                graph.joins.push(IncludeJoin {
                    entry: graph.aliases.entries.len() - 1,
                    parent,
                    navigation,
                    fans_out,
                });
            }
        }
        Ok(graph)
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Aliases reachable without multiplying root rows.
    pub fn to_one_aliases(&self) -> AliasTable {
        let mut result = AliasTable::default();
        result.entries.push(self.aliases.entries[0].clone());
        for join in self.joins.iter().filter(|j| !j.fans_out) {
            result.entries.push(self.aliases.entries[join.entry].clone());
        }
        result
    }

    /// `t1."title" AS "t1__title"` for every column of every alias.
    pub fn write_columns(&self, writer: &dyn SqlWriter, context: &mut Context, out: &mut String) {
        separated_by(
            out,
            self.aliases.entries.iter().flat_map(|entry| {
                entry
                    .metadata
                    .columns
                    .iter()
                    .map(move |column| (entry.alias.as_str(), column.name))
            }),
            |out, (alias, column)| {
                writer.write_column_ref(context, out, Some(alias), column);
                out.push_str(" AS ");
                writer.write_identifier_quoted(context, out, &column_label(alias, column));
            },
            ", ",
        );
    }

    pub fn write_joins(
        &self,
        writer: &dyn SqlWriter,
        context: &mut Context,
        out: &mut String,
        to_one_only: bool,
    ) {
        let mut context = context.switch_fragment(Fragment::SqlJoin);
        for join in &self.joins {
            if to_one_only && join.fans_out {
                continue;
            }
            let child = &self.aliases.entries[join.entry];
            let parent = &self.aliases.entries[join.parent];
            let (child_column, parent_column) = match join.navigation.kind {
                NavigationKind::HasMany => (
                    column_name(child.metadata, join.navigation.foreign_key),
                    parent.metadata.primary_key().name,
                ),
                NavigationKind::BelongsTo => (
                    child.metadata.primary_key().name,
                    column_name(parent.metadata, join.navigation.foreign_key),
                ),
            };
            out.push_str("\nLEFT JOIN ");
            writer.write_table_ref(&mut context, out, child.metadata, Some(&child.alias));
            out.push_str(" ON ");
            writer.write_column_ref(&mut context, out, Some(&child.alias), child_column);
            out.push_str(" = ");
            writer.write_column_ref(&mut context, out, Some(&parent.alias), parent_column);
        }
    }

    /// Fold joined rows into entity trees, one node per distinct primary key at every level.
    pub fn stitch(&self, rows: Vec<RowLabeled>) -> Result<Vec<EntityNode>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let layouts = self
            .aliases
            .entries
            .iter()
            .map(|entry| -> Result<Layout> {
                let names: RowNames = entry
                    .metadata
                    .columns
                    .iter()
                    .map(|c| c.name.to_string())
                    .collect();
                let positions = entry
                    .metadata
                    .columns
                    .iter()
                    .map(|c| {
                        let label = column_label(&entry.alias, c.name);
                        first
                            .labels
                            .iter()
                            .position(|v| v.eq_ignore_ascii_case(&label))
                            .ok_or_else(|| {
                                OrmError::InvalidOperation(format!(
                                    "joined row is missing the column `{label}`"
                                ))
                            })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Layout {
                    names,
                    positions,
                    key: entry.metadata.primary_key,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let children: Vec<Vec<usize>> = (0..self.aliases.entries.len())
            .map(|entry| {
                self.joins
                    .iter()
                    .enumerate()
                    .filter(|(_, j)| j.parent == entry)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        let stitcher = Stitcher {
            joins: &self.joins,
            layouts,
            children,
        };
        let mut roots = Collected::default();
        for row in &rows {
            stitcher.absorb_into(&mut roots, 0, &row.values);
        }
        Ok(roots
            .nodes
            .into_iter()
            .map(|v| stitcher.finish(v, 0))
            .collect())
    }
}

fn column_label(alias: &str, column: &str) -> String {
    format!("{alias}__{column}")
}

fn column_name(metadata: &'static EntityMetadata, name: &str) -> &'static str {
    metadata.column(name).map(|c| c.name).unwrap_or_default()
}

struct Layout {
    names: RowNames,
    positions: Vec<usize>,
    key: usize,
}

impl Layout {
    fn key<'v>(&self, values: &'v [Value]) -> &'v Value {
        &values[self.positions[self.key]]
    }
    fn extract(&self, values: &[Value]) -> RowLabeled {
        RowLabeled::new(
            self.names.clone(),
            self.positions.iter().map(|i| values[*i].clone()).collect(),
        )
    }
}

struct NodeBuilder {
    row: RowLabeled,
    children: Vec<Collected>,
}

#[derive(Default)]
struct Collected {
    nodes: Vec<NodeBuilder>,
    index: HashMap<String, usize>,
}

struct Stitcher<'g> {
    joins: &'g [IncludeJoin],
    layouts: Vec<Layout>,
    /// Join indexes whose parent is the entry.
    children: Vec<Vec<usize>>,
}

impl Stitcher<'_> {
    fn absorb_into(&self, collected: &mut Collected, entry: usize, values: &[Value]) {
        let layout = &self.layouts[entry];
        let key = layout.key(values);
        if key.is_null() {
            // Unmatched LEFT JOIN
            return;
        }
        let key = key.identity_key();
        let position = match collected.index.get(&key) {
            Some(position) => *position,
            None => {
                collected.nodes.push(NodeBuilder {
                    row: layout.extract(values),
                    children: self.children[entry]
                        .iter()
                        .map(|_| Collected::default())
                        .collect(),
                });
                collected.index.insert(key, collected.nodes.len() - 1);
                collected.nodes.len() - 1
            }
        };
        let node = &mut collected.nodes[position];
        for (slot, join) in self.children[entry].iter().enumerate() {
            self.absorb_into(&mut node.children[slot], self.joins[*join].entry, values);
        }
    }

    fn finish(&self, node: NodeBuilder, entry: usize) -> EntityNode {
        let related = node
            .children
            .into_iter()
            .zip(&self.children[entry])
            .map(|(collected, join)| {
                let join = &self.joins[*join];
                (
                    join.navigation.name,
                    collected
                        .nodes
                        .into_iter()
                        .map(|v| self.finish(v, join.entry))
                        .collect(),
                )
            })
            .collect();
        EntityNode {
            row: node.row,
            related,
        }
    }
}
