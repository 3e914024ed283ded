//! Change log lock entity
//!
//! Mirrors the conventional `databasechangeloglock` table: a single row with
//! `id = 1` that is overwritten on every acquire and release.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the singleton lock row
pub const LOCK_ROW_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "databasechangeloglock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub locked: bool,
    pub lockgranted: Option<DateTime>,
    pub lockedby: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
