use crate::{AsValue, BinaryOpType, Order, Ordered, Value};
use std::ops::{Add, BitAnd, BitOr, Mul, Not, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Contains,
    StartsWith,
    EndsWith,
    ToUpper,
    ToLower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Immutable expression tree compiled by the [`crate::SqlWriter`] into SQL and bound parameters.
///
/// Trees are built with [`col`], [`lit`] and the combinator methods:
/// ```rust
/// use quarry_core::{col, lit};
/// let predicate = col("age").ge(18).and(col("name").starts_with("A"));
/// let total = col("price") * col("quantity") + lit(5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// Member path, every segment but the last one is a navigation (`Company.Industry`).
    Member(Vec<String>),
    Binary {
        op: BinaryOpType,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Method {
        method: StringMethod,
        target: Box<Expr>,
        argument: Option<Box<Expr>>,
    },
    In {
        target: Box<Expr>,
        values: Vec<Value>,
    },
    IsNull {
        target: Box<Expr>,
        negated: bool,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `argument` is `None` for `COUNT(*)`.
    Aggregate {
        function: AggregateFunction,
        argument: Option<Box<Expr>>,
    },
    JsonPath {
        target: Box<Expr>,
        path: Vec<String>,
    },
}

/// Column reference, dots separate navigations from the column name.
pub fn col(path: &str) -> Expr {
    Expr::Member(path.split('.').map(str::to_owned).collect())
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// `CASE WHEN condition THEN then ELSE otherwise END`
pub fn when(condition: Expr, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    Expr::Conditional {
        condition: condition.into(),
        then: Box::new(then.into()),
        otherwise: Box::new(otherwise.into()),
    }
}

/// `COUNT(*)`
pub fn count_all() -> Expr {
    Expr::Aggregate {
        function: AggregateFunction::Count,
        argument: None,
    }
}

macro_rules! binary {
    ($name:ident, $op:path) => {
        pub fn $name(self, other: impl Into<Expr>) -> Expr {
            Expr::Binary {
                op: $op,
                lhs: self.into(),
                rhs: Box::new(other.into()),
            }
        }
    };
}

macro_rules! aggregate {
    ($name:ident, $function:path) => {
        pub fn $name(self) -> Expr {
            Expr::Aggregate {
                function: $function,
                argument: Some(self.into()),
            }
        }
    };
}

impl Expr {
    binary!(eq, BinaryOpType::Equal);
    binary!(ne, BinaryOpType::NotEqual);
    binary!(lt, BinaryOpType::Less);
    binary!(gt, BinaryOpType::Greater);
    binary!(le, BinaryOpType::LessEqual);
    binary!(ge, BinaryOpType::GreaterEqual);
    binary!(and, BinaryOpType::And);
    binary!(or, BinaryOpType::Or);
    binary!(add, BinaryOpType::Addition);
    binary!(sub, BinaryOpType::Subtraction);
    binary!(mul, BinaryOpType::Multiplication);

    aggregate!(count, AggregateFunction::Count);
    aggregate!(sum, AggregateFunction::Sum);
    aggregate!(avg, AggregateFunction::Avg);
    aggregate!(min, AggregateFunction::Min);
    aggregate!(max, AggregateFunction::Max);

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(self.into())
    }

    pub fn contains(self, value: impl Into<Expr>) -> Expr {
        self.method(StringMethod::Contains, Some(value.into()))
    }
    pub fn starts_with(self, value: impl Into<Expr>) -> Expr {
        self.method(StringMethod::StartsWith, Some(value.into()))
    }
    pub fn ends_with(self, value: impl Into<Expr>) -> Expr {
        self.method(StringMethod::EndsWith, Some(value.into()))
    }
    pub fn to_upper(self) -> Expr {
        self.method(StringMethod::ToUpper, None)
    }
    pub fn to_lower(self) -> Expr {
        self.method(StringMethod::ToLower, None)
    }
    fn method(self, method: StringMethod, argument: Option<Expr>) -> Expr {
        Expr::Method {
            method,
            target: self.into(),
            argument: argument.map(Box::new),
        }
    }

    /// Membership in a list of constants, an empty list never matches.
    pub fn is_in<V: AsValue>(self, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::In {
            target: self.into(),
            values: values.into_iter().map(AsValue::as_value).collect(),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            target: self.into(),
            negated: false,
        }
    }
    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            target: self.into(),
            negated: true,
        }
    }

    /// Text value at a dotted path of a JSON column (`"address.city"`, `"tags.0"`).
    pub fn json_get(self, path: &str) -> Expr {
        Expr::JsonPath {
            target: self.into(),
            path: path.split('.').map(str::to_owned).collect(),
        }
    }

    pub fn asc(self) -> Ordered {
        Ordered {
            order: Order::ASC,
            expression: self,
        }
    }
    pub fn desc(self) -> Ordered {
        Ordered {
            order: Order::DESC,
            expression: self,
        }
    }

    /// Null constant, of any type.
    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expr::Constant(v) if v.is_null())
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Constant(..) | Expr::Member(..) => false,
            Expr::Binary { lhs, rhs, .. } => lhs.contains_aggregate() || rhs.contains_aggregate(),
            Expr::Not(v) => v.contains_aggregate(),
            Expr::Method {
                target, argument, ..
            } => {
                target.contains_aggregate()
                    || argument.as_ref().is_some_and(|v| v.contains_aggregate())
            }
            Expr::In { target, .. }
            | Expr::IsNull { target, .. }
            | Expr::JsonPath { target, .. } => target.contains_aggregate(),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.contains_aggregate()
                    || then.contains_aggregate()
                    || otherwise.contains_aggregate()
            }
        }
    }
}

impl<T: AsValue> From<T> for Expr {
    fn from(value: T) -> Self {
        Expr::Constant(value.as_value())
    }
}

impl From<&'static str> for Expr {
    fn from(value: &'static str) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Self) -> Self::Output {
        Expr::add(self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Self) -> Self::Output {
        Expr::sub(self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Self) -> Self::Output {
        Expr::mul(self, rhs)
    }
}

impl BitAnd for Expr {
    type Output = Expr;
    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Self::Output {
        Expr::not(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_shapes() {
        let expr = col("Company.Industry").eq("Software");
        let Expr::Binary { op, lhs, rhs } = &expr else {
            panic!("Expected a binary expression");
        };
        assert_eq!(*op, BinaryOpType::Equal);
        assert_eq!(
            **lhs,
            Expr::Member(vec!["Company".into(), "Industry".into()])
        );
        assert_eq!(**rhs, Expr::Constant(Value::Varchar(Some("Software".into()))));
        assert_eq!(col("a") & col("b"), col("a").and(col("b")));
        assert_eq!(!col("a"), Expr::Not(Box::new(col("a"))));
    }

    #[test]
    fn collects_navigations() {
        let expr = col("Company.Industry")
            .eq("Software")
            .or(col("Company.Parent.Name").contains("x"))
            .and(col("Name").is_not_null());
        let mut navigations = Vec::new();
        expr.navigations(&mut navigations);
        assert_eq!(
            navigations,
            vec![vec!["Company".to_string()], vec!["Company".into(), "Parent".into()]]
        );
        assert!(!expr.contains_aggregate());
        assert!(col("x").sum().gt(3).contains_aggregate());
    }
}
