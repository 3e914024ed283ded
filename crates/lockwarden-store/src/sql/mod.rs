//! SQL-backed lock store (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Every mutation is a single `UPDATE ... WHERE` on the singleton row, so the
//! database provides the compare-and-swap. Success is judged by `rows_affected`.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{prelude::Expr, *};
use tracing::{debug, info};

use lockwarden_common::{LockError, Result};

use crate::entity::database_change_log_lock::{self, LOCK_ROW_ID};
use crate::model::LockRecord;
use crate::traits::LockStore;

fn read_error(e: DbErr) -> LockError {
    LockError::StoreRead(e.to_string())
}

fn write_error(e: DbErr) -> LockError {
    LockError::StoreWrite(e.to_string())
}

/// Change log lock store over a SeaORM connection
pub struct SqlLockStore {
    db: DatabaseConnection,
}

impl SqlLockStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the lock table if absent and make sure the unlocked singleton row exists.
    ///
    /// Safe to call from several instances at once: a duplicate insert loses
    /// to the row another instance just created.
    pub async fn init(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut create = schema.create_table_from_entity(database_change_log_lock::Entity);
        create.if_not_exists();
        self.db
            .execute(backend.build(&create))
            .await
            .map_err(write_error)?;

        if self.find_row().await?.is_some() {
            return Ok(());
        }

        let row = database_change_log_lock::ActiveModel {
            id: Set(LOCK_ROW_ID),
            locked: Set(false),
            lockgranted: Set(None),
            lockedby: Set(None),
        };
        if let Err(e) = database_change_log_lock::Entity::insert(row)
            .exec_without_returning(&self.db)
            .await
        {
            if self.find_row().await?.is_none() {
                return Err(write_error(e));
            }
            debug!("Lock row created concurrently by another instance");
        } else {
            info!("Initialized change log lock table");
        }
        Ok(())
    }

    async fn find_row(&self) -> Result<Option<database_change_log_lock::Model>> {
        database_change_log_lock::Entity::find_by_id(LOCK_ROW_ID)
            .one(&self.db)
            .await
            .map_err(read_error)
    }

    fn clear_statement() -> UpdateMany<database_change_log_lock::Entity> {
        database_change_log_lock::Entity::update_many()
            .col_expr(database_change_log_lock::Column::Locked, Expr::value(false))
            .col_expr(
                database_change_log_lock::Column::Lockgranted,
                Expr::value(Option::<NaiveDateTime>::None),
            )
            .col_expr(
                database_change_log_lock::Column::Lockedby,
                Expr::value(Option::<String>::None),
            )
            .filter(database_change_log_lock::Column::Id.eq(LOCK_ROW_ID))
    }
}

#[async_trait]
impl LockStore for SqlLockStore {
    async fn read(&self) -> Result<LockRecord> {
        self.find_row()
            .await?
            .map(LockRecord::from)
            .ok_or_else(|| {
                LockError::StoreRead("change log lock row is missing, run init first".to_string())
            })
    }

    async fn try_acquire(&self, holder: &str) -> Result<bool> {
        let granted = Utc::now().naive_utc();
        let result = database_change_log_lock::Entity::update_many()
            .col_expr(database_change_log_lock::Column::Locked, Expr::value(true))
            .col_expr(
                database_change_log_lock::Column::Lockgranted,
                Expr::value(granted),
            )
            .col_expr(
                database_change_log_lock::Column::Lockedby,
                Expr::value(holder.to_string()),
            )
            .filter(database_change_log_lock::Column::Id.eq(LOCK_ROW_ID))
            .filter(database_change_log_lock::Column::Locked.eq(false))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        let acquired = result.rows_affected == 1;
        debug!(holder = %holder, acquired, "Lock acquire attempted");
        Ok(acquired)
    }

    async fn release(&self, holder: &str) -> Result<bool> {
        let result = Self::clear_statement()
            .filter(database_change_log_lock::Column::Locked.eq(true))
            .filter(database_change_log_lock::Column::Lockedby.eq(holder))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        let released = result.rows_affected == 1;
        debug!(holder = %holder, released, "Lock release attempted");
        Ok(released)
    }

    async fn force_release(&self) -> Result<()> {
        Self::clear_statement()
            .exec(&self.db)
            .await
            .map_err(write_error)?;
        debug!("Lock force-released");
        Ok(())
    }
}
