use crate::{Entity, Expr, RawSql, Result, RowLabeled};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionSource {
    Expr(Expr),
    Raw(RawSql),
}

/// One item of a select list, labelled with `alias` when given.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub source: ProjectionSource,
    pub alias: Option<String>,
}

impl Projection {
    pub fn raw(raw: RawSql, alias: Option<String>) -> Self {
        Self {
            source: ProjectionSource::Raw(raw),
            alias,
        }
    }
}

impl From<Expr> for Projection {
    fn from(value: Expr) -> Self {
        Self {
            source: ProjectionSource::Expr(value),
            alias: None,
        }
    }
}

impl Expr {
    /// Select this expression under the given label.
    pub fn alias(self, alias: impl Into<String>) -> Projection {
        Projection {
            source: ProjectionSource::Expr(self),
            alias: Some(alias.into()),
        }
    }
}

/// Construction recipe of a projection target, reading cells by label.
pub trait FromRow: Sized {
    fn from_labeled(row: &RowLabeled) -> Result<Self>;
}

impl FromRow for RowLabeled {
    fn from_labeled(row: &RowLabeled) -> Result<Self> {
        Ok(row.clone())
    }
}

impl<E: Entity> FromRow for E {
    fn from_labeled(row: &RowLabeled) -> Result<Self> {
        <E as Entity>::from_row(row)
    }
}
