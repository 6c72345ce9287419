use crate::{OpPrecedence, writer::SqlWriter};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpType {
    Multiplication,
    Addition,
    Subtraction,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOpType {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOpType::Equal
                | BinaryOpType::NotEqual
                | BinaryOpType::Less
                | BinaryOpType::Greater
                | BinaryOpType::LessEqual
                | BinaryOpType::GreaterEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOpType::And | BinaryOpType::Or)
    }

    /// `a op (b op c)` evaluates like `(a op b) op c`.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOpType::And
                | BinaryOpType::Or
                | BinaryOpType::Addition
                | BinaryOpType::Multiplication
        )
    }

    /// Same comparison with the operands swapped.
    pub fn flipped(&self) -> Self {
        match self {
            BinaryOpType::Less => BinaryOpType::Greater,
            BinaryOpType::Greater => BinaryOpType::Less,
            BinaryOpType::LessEqual => BinaryOpType::GreaterEqual,
            BinaryOpType::GreaterEqual => BinaryOpType::LessEqual,
            v => *v,
        }
    }
}

impl OpPrecedence for BinaryOpType {
    fn precedence(&self, writer: &dyn SqlWriter) -> i32 {
        writer.expression_binary_op_precedence(self)
    }
}

impl Display for BinaryOpType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOpType::Multiplication => "Multiplication",
            BinaryOpType::Addition => "Addition",
            BinaryOpType::Subtraction => "Subtraction",
            BinaryOpType::Equal => "Equal",
            BinaryOpType::NotEqual => "NotEqual",
            BinaryOpType::Less => "Less",
            BinaryOpType::Greater => "Greater",
            BinaryOpType::LessEqual => "LessEqual",
            BinaryOpType::GreaterEqual => "GreaterEqual",
            BinaryOpType::And => "And",
            BinaryOpType::Or => "Or",
        })
    }
}
