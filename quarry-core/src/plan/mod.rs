mod builder;
mod cte;
pub(crate) mod include;
mod projection;
mod query_plan;
mod raw;
mod window;

pub use builder::*;
pub use cte::*;
pub use projection::*;
pub use query_plan::*;
pub use raw::*;
pub use window::*;
