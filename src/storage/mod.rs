//! Storage Layer
//!
//! SQLite persistence with connection pooling. `database` owns the pool,
//! schema, and migrations; the entity files add impl blocks on
//! [`Database`] for worklist items, articles/images, proofreading
//! artifacts, and publish tasks.

mod articles;
mod database;
mod proofreading;
mod publish;
mod worklist;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use worklist::NewWorklistItem;
