use crate::{EntityMetadata, Value};
use std::ops::{Deref, DerefMut};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    SqlDeleteFromWhere,
    SqlInsertInto,
    SqlInsertIntoOnConflict,
    SqlInsertIntoValues,
    SqlJoin,
    SqlSelect,
    SqlSelectFrom,
    SqlSelectGroupBy,
    SqlSelectHaving,
    SqlSelectOrderBy,
    SqlSelectWhere,
    SqlUpdateSet,
    SqlUpdateWhere,
    SqlWindow,
}

impl Fragment {
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            Fragment::SqlSelectWhere
                | Fragment::SqlDeleteFromWhere
                | Fragment::SqlUpdateWhere
                | Fragment::SqlJoin
        )
    }
}

/// Alias registered for the root entity or for one joined navigation path.
#[derive(Debug, Clone)]
pub struct AliasEntry {
    /// Navigations from the root, empty for the root itself.
    pub path: Vec<String>,
    pub alias: String,
    pub metadata: &'static EntityMetadata,
}

/// Navigation path to table alias lookup used to resolve member accesses.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    pub entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn new(root: &'static EntityMetadata) -> Self {
        Self {
            entries: vec![AliasEntry {
                path: Vec::new(),
                alias: "t0".into(),
                metadata: root,
            }],
        }
    }

    pub fn register(
        &mut self,
        path: Vec<String>,
        metadata: &'static EntityMetadata,
    ) -> &AliasEntry {
        let alias = format!("t{}", self.entries.len());
        self.entries.push(AliasEntry {
            path,
            alias,
            metadata,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn root(&self) -> Option<&AliasEntry> {
        self.entries.first()
    }

    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&AliasEntry> {
        self.position(path).map(|i| &self.entries[i])
    }

    pub fn position<S: AsRef<str>>(&self, path: &[S]) -> Option<usize> {
        self.entries.iter().position(|v| {
            v.path.len() == path.len() && v.path.iter().zip(path).all(|(a, b)| a == b.as_ref())
        })
    }
}

/// Writing state threaded through every `SqlWriter` call: the clause being written, the
/// aliases in scope and the parameters bound so far (placeholder `n` is `params[n - 1]`).
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub fragment: Fragment,
    pub qualify_columns: bool,
    pub aliases: Option<&'a AliasTable>,
    pub params: Vec<Value>,
}

impl<'a> Context<'a> {
    pub fn new(fragment: Fragment, qualify_columns: bool) -> Self {
        Self {
            fragment,
            qualify_columns,
            aliases: None,
            params: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &'a AliasTable) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// Change the fragment until the returned guard is dropped.
    pub fn switch_fragment<'s>(&'s mut self, fragment: Fragment) -> ContextUpdater<'s, 'a> {
        let previous = self.fragment;
        self.fragment = fragment;
        ContextUpdater {
            previous,
            current: self,
        }
    }
}

impl Default for Context<'_> {
    fn default() -> Self {
        Context::new(Fragment::None, true)
    }
}

pub struct ContextUpdater<'s, 'a> {
    previous: Fragment,
    pub current: &'s mut Context<'a>,
}

impl<'a> Deref for ContextUpdater<'_, 'a> {
    type Target = Context<'a>;
    fn deref(&self) -> &Self::Target {
        &*self.current
    }
}

impl DerefMut for ContextUpdater<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.current
    }
}

impl Drop for ContextUpdater<'_, '_> {
    fn drop(&mut self) {
        self.current.fragment = self.previous;
    }
}
