pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::courier::status::LocalStatus;
use crate::errors::StoreError;
use crate::models::order::OrderRecord;

/// Key-value settings rows (credentials and cached token state).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads several keys in one round trip. Absent keys are simply missing
    /// from the returned map.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError>;

    /// Upserts a single key.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes several keys. The default issues independent writes; backends
    /// that can do better make it all-or-nothing.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

/// Order fields touched by shipment creation and tracking.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderRecord>, StoreError>;

    /// Reverse lookup from a courier consignment id.
    async fn find_by_consignment(
        &self,
        consignment_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError>;

    /// Attaches a consignment to an order that has none yet. Returns false if
    /// the order does not exist or is already linked.
    async fn link_consignment(
        &self,
        order_id: Uuid,
        consignment_id: &str,
    ) -> Result<bool, StoreError>;

    /// Writes `pathao_status` and, when given, the local `status`.
    /// Returns false if the order does not exist.
    async fn record_tracking(
        &self,
        order_id: Uuid,
        courier_status: &str,
        local_status: Option<LocalStatus>,
    ) -> Result<bool, StoreError>;
}
