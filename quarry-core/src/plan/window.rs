use crate::{AggregateFunction, Expr, Ordered};

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    /// Aggregate evaluated over the window, `None` argument is `COUNT(*)`.
    Aggregate(AggregateFunction, Option<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: FrameBound,
}

/// Window function added to the select list under `alias`.
///
/// ```rust
/// use quarry_core::{FrameBound, WindowSpec, col};
/// let running = WindowSpec::sum(col("amount"))
///     .partition_by(col("customer_id"))
///     .order_by(col("placed_at").asc())
///     .rows(FrameBound::UnboundedPreceding, FrameBound::CurrentRow)
///     .alias("running_total");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub function: WindowFunction,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<Ordered>,
    pub frame: Option<WindowFrame>,
    pub alias: String,
}

impl WindowSpec {
    pub fn new(function: WindowFunction) -> Self {
        Self {
            function,
            partition_by: Vec::new(),
            order_by: Vec::new(),
            frame: None,
            alias: String::new(),
        }
    }
    pub fn row_number() -> Self {
        Self::new(WindowFunction::RowNumber)
    }
    pub fn rank() -> Self {
        Self::new(WindowFunction::Rank)
    }
    pub fn dense_rank() -> Self {
        Self::new(WindowFunction::DenseRank)
    }
    pub fn sum(argument: Expr) -> Self {
        Self::new(WindowFunction::Aggregate(
            AggregateFunction::Sum,
            Some(argument),
        ))
    }
    pub fn avg(argument: Expr) -> Self {
        Self::new(WindowFunction::Aggregate(
            AggregateFunction::Avg,
            Some(argument),
        ))
    }
    pub fn count_all() -> Self {
        Self::new(WindowFunction::Aggregate(AggregateFunction::Count, None))
    }
    pub fn partition_by(mut self, expression: Expr) -> Self {
        self.partition_by.push(expression);
        self
    }
    pub fn order_by(mut self, ordered: impl Into<Ordered>) -> Self {
        self.order_by.push(ordered.into());
        self
    }
    pub fn rows(mut self, start: FrameBound, end: FrameBound) -> Self {
        self.frame = Some(WindowFrame {
            units: FrameUnits::Rows,
            start,
            end,
        });
        self
    }
    pub fn range(mut self, start: FrameBound, end: FrameBound) -> Self {
        self.frame = Some(WindowFrame {
            units: FrameUnits::Range,
            start,
            end,
        });
        self
    }
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}
