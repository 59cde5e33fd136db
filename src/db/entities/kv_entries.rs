//! DB storage for key-value entries
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "kv_entries")]
/// One stored value
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    /// storage key
    pub storage_key: String,
    #[sea_orm(column_type = "Text")]
    /// stored value
    pub value: String,
    /// last write
    pub updated_at: DateTime,
}

/// no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
