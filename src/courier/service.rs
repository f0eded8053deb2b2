//! Courier operations as seen by the rest of the storefront: location lookups,
//! shipment registration and tracking with status write-back.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::client::CourierClient;
use super::envelope::string_field;
use super::status::{self, INITIAL_COURIER_STATUS};
use super::token::TokenManager;
use crate::errors::CourierError;
use crate::models::order::{OrderRecord, OrderRef, TrackingOutcome};
use crate::models::shipment::{Location, ShipmentRequest};
use crate::store::OrderStore;

/// A shipment registered with the courier and linked to a local order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedShipment {
    pub order_id: Uuid,
    pub consignment_id: String,
    /// Provider payload as returned.
    pub courier: Value,
}

pub struct CourierService {
    tokens: Arc<TokenManager>,
    client: Arc<CourierClient>,
    orders: Arc<dyn OrderStore>,
}

impl CourierService {
    pub fn new(
        tokens: Arc<TokenManager>,
        client: Arc<CourierClient>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            tokens,
            client,
            orders,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn cities(&self) -> Result<Vec<Location>, CourierError> {
        let token = self.tokens.get_valid_token().await?;
        self.client.list_cities(&token).await
    }

    pub async fn zones(&self, city_id: i64) -> Result<Vec<Location>, CourierError> {
        let token = self.tokens.get_valid_token().await?;
        self.client.list_zones(&token, city_id).await
    }

    pub async fn areas(&self, zone_id: i64) -> Result<Vec<Location>, CourierError> {
        let token = self.tokens.get_valid_token().await?;
        self.client.list_areas(&token, zone_id).await
    }

    /// Registers a shipment for `order_id` and links the returned consignment
    /// id to the order.
    pub async fn create_shipment_for_order(
        &self,
        order_id: Uuid,
        mut request: ShipmentRequest,
    ) -> Result<CreatedShipment, CourierError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CourierError::NotFound(format!("order {} does not exist", order_id)))?;

        if let Some(existing) = order.pathao_consignment_id.as_deref() {
            return Err(CourierError::Conflict(format!(
                "order {} already has consignment {}",
                order_id, existing
            )));
        }
        if request.merchant_order_id.is_none() {
            request.merchant_order_id = Some(order_id.to_string());
        }

        let token = self.tokens.get_valid_token().await?;
        let courier = self.client.create_shipment(&token, &request).await?;
        let consignment_id = string_field(&courier, "consignment_id").ok_or_else(|| {
            CourierError::gateway("shipment response carried no consignment_id", None)
        })?;

        if !self.orders.link_consignment(order_id, &consignment_id).await? {
            // The shipment exists at the provider but belongs to no order.
            tracing::error!(
                %order_id,
                orphaned_consignment_id = %consignment_id,
                "order changed while registering shipment; consignment left unlinked"
            );
            return Err(match self.orders.get_order(order_id).await? {
                Some(current) => CourierError::Conflict(format!(
                    "order {} was linked to consignment {} concurrently; {} is not linked",
                    order_id,
                    current.pathao_consignment_id.as_deref().unwrap_or("?"),
                    consignment_id
                )),
                None => CourierError::NotFound(format!(
                    "order {} was removed while registering consignment {}",
                    order_id, consignment_id
                )),
            });
        }

        let initial = status::translate(INITIAL_COURIER_STATUS)
            .filter(|next| status::should_apply(&order.status, *next));
        if !self
            .orders
            .record_tracking(order_id, INITIAL_COURIER_STATUS, initial)
            .await?
        {
            tracing::warn!(%order_id, %consignment_id, "order vanished before initial courier status was recorded");
        }

        tracing::info!(%order_id, %consignment_id, "shipment registered with courier");
        Ok(CreatedShipment {
            order_id,
            consignment_id,
            courier,
        })
    }

    /// Fetches the courier's view of a shipment and writes it back to the
    /// order.
    ///
    /// `pathao_status` is always updated; `status` only when the courier
    /// status translates and the move is not a regression. If no order can be
    /// linked to the consignment, nothing is written but the result is still
    /// returned.
    pub async fn track_and_sync(&self, order_ref: &OrderRef) -> Result<TrackingOutcome, CourierError> {
        let (consignment_id, mut order) = self.resolve(order_ref).await?;

        let token = self.tokens.get_valid_token().await?;
        let record = self.client.track_shipment(&token, &consignment_id).await?;
        let courier_status = string_field(&record, "order_status").ok_or_else(|| {
            CourierError::gateway("tracking response carried no order_status", None)
        })?;
        let local_status = status::translate(&courier_status);

        if order.is_none() {
            order = self.orders.find_by_consignment(&consignment_id).await?;
        }

        let Some(order) = order else {
            tracing::warn!(%consignment_id, %courier_status, "tracked consignment has no linked order");
            return Ok(TrackingOutcome {
                consignment_id,
                courier_status,
                local_status,
                order_id: None,
                status_applied: false,
            });
        };

        let applied = match local_status {
            Some(next) if status::should_apply(&order.status, next) => Some(next),
            Some(next) => {
                tracing::warn!(
                    order_id = %order.id,
                    current = %order.status,
                    reported = %next,
                    %courier_status,
                    "ignoring courier status regression"
                );
                None
            }
            None => {
                tracing::debug!(order_id = %order.id, %courier_status, "courier status has no local mapping");
                None
            }
        };

        let written = self
            .orders
            .record_tracking(order.id, &courier_status, applied)
            .await?;

        tracing::info!(
            order_id = %order.id,
            %consignment_id,
            %courier_status,
            local_status = ?applied,
            "tracking synced"
        );

        Ok(TrackingOutcome {
            consignment_id,
            courier_status,
            local_status,
            order_id: written.then_some(order.id),
            status_applied: written && applied.is_some(),
        })
    }

    /// Finds the consignment to track, and the order when one was named and
    /// exists. A supplied consignment id must match the one the order is
    /// already linked to.
    async fn resolve(
        &self,
        order_ref: &OrderRef,
    ) -> Result<(String, Option<OrderRecord>), CourierError> {
        let order = match order_ref.order_id {
            Some(id) => self.orders.get_order(id).await?,
            None => None,
        };

        let linked = order
            .as_ref()
            .and_then(|o| o.pathao_consignment_id.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        if let Some(direct) = order_ref.direct_consignment() {
            if let (Some(linked), Some(o)) = (linked.as_deref(), order.as_ref()) {
                if linked != direct {
                    return Err(CourierError::Conflict(format!(
                        "order {} is linked to consignment {}, not {}",
                        o.id, linked, direct
                    )));
                }
            }
            return Ok((direct.to_string(), order));
        }

        match (linked, order_ref.order_id) {
            (Some(c), _) => Ok((c, order)),
            (None, Some(id)) if order.is_some() => Err(CourierError::NotFound(format!(
                "order {} has no courier consignment",
                id
            ))),
            (None, Some(id)) => Err(CourierError::NotFound(format!("order {} does not exist", id))),
            (None, None) => Err(CourierError::NotFound(
                "no order_id or consignment_id supplied".to_string(),
            )),
        }
    }
}
