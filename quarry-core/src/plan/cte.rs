use crate::{QueryPlan, RawSql};

#[derive(Debug, Clone)]
pub enum CteBody {
    Raw(RawSql),
    Plan(Box<QueryPlan>),
}

/// Named subquery written in the WITH clause ahead of the main statement.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub recursive: bool,
    pub body: CteBody,
}

impl Cte {
    pub fn raw(name: impl Into<String>, columns: &[&str], body: RawSql) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|v| v.to_string()).collect(),
            recursive: false,
            body: CteBody::Raw(body),
        }
    }

    pub fn plan(name: impl Into<String>, columns: &[&str], body: QueryPlan) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|v| v.to_string()).collect(),
            recursive: false,
            body: CteBody::Plan(body.into()),
        }
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}
