//! Multi-dialect relational data access.
//!
//! Entities are described once with [`EntityDef`], queried through [`QueryBuilder`] and saved
//! with the mutation methods of [`Entity`]. Drivers live in their own crates (`quarry-sqlite`)
//! and plug in through [`Driver`] and [`Connection`].
pub use quarry_core::*;
