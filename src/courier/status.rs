//! Courier status vocabulary → local order status.
//!
//! `translate` is a fixed lookup. Anything the table does not know maps to
//! `None`, which callers must read as "leave the order status alone".
//!
//! Local statuses also carry a transition guard so an out-of-order report
//! from the courier (e.g. `In_Transit` after `Delivered`) does not roll an
//! order backwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order status in the store's own vocabulary, restricted to the values the
/// courier integration can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatus {
    SentToCourier,
    PickedUp,
    InTransit,
    Completed,
    Returned,
    Cancelled,
}

impl LocalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalStatus::SentToCourier => "sent_to_courier",
            LocalStatus::PickedUp => "picked_up",
            LocalStatus::InTransit => "in_transit",
            LocalStatus::Completed => "completed",
            LocalStatus::Returned => "returned",
            LocalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LocalStatus::Completed | LocalStatus::Returned | LocalStatus::Cancelled
        )
    }

    /// Position along the forward delivery path. Terminal states share the
    /// top rank.
    fn rank(&self) -> u8 {
        match self {
            LocalStatus::SentToCourier => 0,
            LocalStatus::PickedUp => 1,
            LocalStatus::InTransit => 2,
            LocalStatus::Completed | LocalStatus::Returned | LocalStatus::Cancelled => 3,
        }
    }

    /// Whether an order currently in `self` may be moved to `next`.
    ///
    /// Re-applying the same status is allowed. Terminal states are final,
    /// except that a completed order can still come back as returned.
    pub fn permits(&self, next: LocalStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return *self == LocalStatus::Completed && next == LocalStatus::Returned;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent_to_courier" => Ok(LocalStatus::SentToCourier),
            "picked_up" => Ok(LocalStatus::PickedUp),
            "in_transit" => Ok(LocalStatus::InTransit),
            "completed" => Ok(LocalStatus::Completed),
            "returned" => Ok(LocalStatus::Returned),
            "cancelled" => Ok(LocalStatus::Cancelled),
            other => Err(format!("unknown local status '{}'", other)),
        }
    }
}

/// Courier-reported status on a freshly created shipment.
pub const INITIAL_COURIER_STATUS: &str = "Pending";

/// Maps a courier status onto the local vocabulary.
pub fn translate(courier_status: &str) -> Option<LocalStatus> {
    match courier_status.trim() {
        "Pending" | "Pickup_Requested" => Some(LocalStatus::SentToCourier),
        "Picked" => Some(LocalStatus::PickedUp),
        "In_Transit" => Some(LocalStatus::InTransit),
        "Delivered" | "Partial_Delivered" => Some(LocalStatus::Completed),
        "Returned" | "Return_In_Transit" => Some(LocalStatus::Returned),
        "Cancelled" => Some(LocalStatus::Cancelled),
        _ => None,
    }
}

/// Decides whether `next` should overwrite an order's current status.
///
/// Statuses outside the courier vocabulary (set by other order flows) never
/// block a courier update.
pub fn should_apply(current: &str, next: LocalStatus) -> bool {
    match current.parse::<LocalStatus>() {
        Ok(cur) => cur.permits(next),
        Err(_) => true,
    }
}
