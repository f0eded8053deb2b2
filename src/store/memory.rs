//! In-process store used by tests and `--in-memory` dry runs.
//!
//! Counts every settings write so callers can assert how many times the token
//! record was persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{OrderStore, SettingsStore};
use crate::courier::status::LocalStatus;
use crate::errors::StoreError;
use crate::models::order::OrderRecord;

#[derive(Clone, Default)]
pub struct MemoryStore {
    settings: Arc<DashMap<String, String>>,
    orders: Arc<DashMap<Uuid, OrderRecord>>,
    setting_writes: Arc<AtomicUsize>,
    batch_writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds settings without counting them as writes.
    pub fn with_settings<'a>(self, entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (k, v) in entries {
            self.settings.insert(k.to_string(), v.to_string());
        }
        self
    }

    pub fn insert_order(&self, order: OrderRecord) {
        self.orders.insert(order.id, order);
    }

    /// Creates an order in `status` and returns its id.
    pub fn new_order(&self, status: &str, consignment_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_order(OrderRecord {
            id,
            status: status.to_string(),
            pathao_consignment_id: consignment_id.map(String::from),
            pathao_status: None,
            updated_at: None,
        });
        id
    }

    pub fn order(&self, id: Uuid) -> Option<OrderRecord> {
        self.orders.get(&id).map(|o| o.clone())
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).map(|v| v.clone())
    }

    /// Number of individual keys written since creation.
    pub fn setting_writes(&self) -> usize {
        self.setting_writes.load(Ordering::SeqCst)
    }

    /// Number of `set_many` batches written since creation.
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.settings.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.settings.insert(key.to_string(), value.to_string());
        self.setting_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.settings.insert(key.to_string(), value.clone());
        }
        self.setting_writes.fetch_add(entries.len(), Ordering::SeqCst);
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.order(order_id))
    }

    async fn find_by_consignment(
        &self,
        consignment_id: &str,
    ) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self
            .orders
            .iter()
            .find(|o| o.pathao_consignment_id.as_deref() == Some(consignment_id))
            .map(|o| o.clone()))
    }

    async fn link_consignment(
        &self,
        order_id: Uuid,
        consignment_id: &str,
    ) -> Result<bool, StoreError> {
        match self.orders.get_mut(&order_id) {
            Some(mut order) if order.pathao_consignment_id.is_none() => {
                order.pathao_consignment_id = Some(consignment_id.to_string());
                order.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_tracking(
        &self,
        order_id: Uuid,
        courier_status: &str,
        local_status: Option<LocalStatus>,
    ) -> Result<bool, StoreError> {
        match self.orders.get_mut(&order_id) {
            Some(mut order) => {
                order.pathao_status = Some(courier_status.to_string());
                if let Some(status) = local_status {
                    order.status = status.as_str().to_string();
                }
                order.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
