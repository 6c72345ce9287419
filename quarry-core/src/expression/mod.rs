mod binary_op;
mod expression;
mod op_precedence;
mod ordered;

pub use binary_op::*;
pub use expression::*;
pub use op_precedence::*;
pub use ordered::*;
