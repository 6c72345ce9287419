use crate::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    ASC,
    DESC,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordered {
    pub order: Order,
    pub expression: Expr,
}

impl Ordered {
    pub fn asc(expression: impl Into<Expr>) -> Self {
        Self {
            order: Order::ASC,
            expression: expression.into(),
        }
    }
    pub fn desc(expression: impl Into<Expr>) -> Self {
        Self {
            order: Order::DESC,
            expression: expression.into(),
        }
    }
}

impl From<Expr> for Ordered {
    fn from(value: Expr) -> Self {
        Ordered::asc(value)
    }
}
