//! Lockwarden Store - Change log lock record persistence
//!
//! This crate provides:
//! - The `LockStore` trait over the shared singleton lock record
//! - SeaORM entity and SQL-backed store (MySQL/PostgreSQL/SQLite)
//! - In-memory store for single-process hosts and tests

pub mod entity;
pub mod memory;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

pub use entity::prelude::*;
pub use memory::MemoryLockStore;
pub use model::LockRecord;
pub use sql::SqlLockStore;
pub use traits::LockStore;
