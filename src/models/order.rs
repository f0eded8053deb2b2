use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::courier::status::LocalStatus;

/// The slice of a storefront order the courier integration reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    /// Local order status. Free text: other order flows write values outside
    /// the courier vocabulary (e.g. `pending`, `processing`).
    pub status: String,
    pub pathao_consignment_id: Option<String>,
    pub pathao_status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How a caller identifies the shipment to track. At least one side must be
/// resolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub order_id: Option<Uuid>,
    pub consignment_id: Option<String>,
}

impl OrderRef {
    pub fn by_order(order_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            consignment_id: None,
        }
    }

    pub fn by_consignment(consignment_id: impl Into<String>) -> Self {
        Self {
            order_id: None,
            consignment_id: Some(consignment_id.into()),
        }
    }

    /// Directly supplied consignment id, ignoring blank strings.
    pub fn direct_consignment(&self) -> Option<&str> {
        self.consignment_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Result of a tracking call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingOutcome {
    pub consignment_id: String,
    /// Raw status string reported by the courier.
    pub courier_status: String,
    /// Translated local status; `None` means "leave the order untouched".
    pub local_status: Option<LocalStatus>,
    /// Order the result was written to, if one could be linked.
    pub order_id: Option<Uuid>,
    /// Whether the local `status` column was actually changed.
    pub status_applied: bool,
}
