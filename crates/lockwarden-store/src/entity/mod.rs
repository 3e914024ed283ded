//! SeaORM entity definitions

pub mod database_change_log_lock;

pub mod prelude {
    pub use super::database_change_log_lock::Entity as DatabaseChangeLogLock;
}
