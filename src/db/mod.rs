//! sqlite-backed key-value storage
pub(crate) mod entities;
pub(crate) mod migrations;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, Database, DatabaseConnection, DbErr, EntityTrait};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::storage::{KeyValueStore, StorageError, check_quota};
use entities::kv_entries;

/// Opens (creating if needed) the sqlite database at `path`.
pub async fn connect_db(path: &str) -> Result<DatabaseConnection, DbErr> {
    let url = format!("sqlite://{}?mode=rwc", path);
    Database::connect(url).await
}

#[cfg(test)]
/// In-memory database for tests.
pub async fn connect_test_db() -> Result<DatabaseConnection, DbErr> {
    Database::connect("sqlite::memory:").await
}

/// [KeyValueStore] on the `kv_entries` table.
#[derive(Clone, Debug)]
pub struct DbStore {
    db: DatabaseConnection,
    quota: Option<usize>,
}

impl DbStore {
    /// Runs pending migrations and wraps the connection.
    pub async fn new(db: DatabaseConnection, quota: Option<usize>) -> Result<Self, DbErr> {
        migrations::Migrator::up(&db, None).await?;
        Ok(Self { db, quota })
    }
}

impl KeyValueStore for DbStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(kv_entries::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(value, self.quota)?;
        let entry = kv_entries::ActiveModel {
            storage_key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now().naive_utc()),
        };
        kv_entries::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(kv_entries::Column::StorageKey)
                    .update_columns([kv_entries::Column::Value, kv_entries::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        kv_entries::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
