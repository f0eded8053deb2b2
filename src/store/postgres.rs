use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{OrderStore, SettingsStore};
use crate::courier::status::LocalStatus;
use crate::errors::StoreError;
use crate::models::order::OrderRecord;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value FROM settings WHERE key = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, NOW())
               ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All keys land in one transaction.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, NOW())
                   ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()"#,
            )
            .bind(*key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query_as::<_, OrderRecord>(
            "SELECT id, status, pathao_consignment_id, pathao_status, updated_at FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_consignment(
        &self,
        consignment_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        // Newest order wins if a consignment id was ever reused.
        let row = sqlx::query_as::<_, OrderRecord>(
            r#"SELECT id, status, pathao_consignment_id, pathao_status, updated_at
               FROM orders WHERE pathao_consignment_id = $1
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(consignment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn link_consignment(
        &self,
        order_id: Uuid,
        consignment_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE orders SET pathao_consignment_id = $2, updated_at = NOW()
               WHERE id = $1 AND pathao_consignment_id IS NULL"#,
        )
        .bind(order_id)
        .bind(consignment_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_tracking(
        &self,
        order_id: Uuid,
        courier_status: &str,
        local_status: Option<LocalStatus>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE orders
               SET pathao_status = $2, status = COALESCE($3, status), updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(order_id)
        .bind(courier_status)
        .bind(local_status.map(|s| s.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
