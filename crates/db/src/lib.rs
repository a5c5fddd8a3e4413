//! SQLite persistence for LECTERN.
//!
//! Every write commits through SQLite before the call returns, so committed
//! data survives a crash. Modules declare their tables and constraints as
//! keyed migrations; uniqueness and referential rules live in the schema and
//! surface as [`DbError`] variants.

pub mod error;
mod pool;

pub use error::DbError;
pub use pool::{new_id, Database};
