use serde::{Deserialize, Serialize};

/// A city, zone or area offered by the courier, reduced to id and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
}

/// Which location list a payload came from. Determines the `<kind>_id` /
/// `<kind>_name` fields projected into a [`Location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    City,
    Zone,
    Area,
}

impl LocationKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            LocationKind::City => "city",
            LocationKind::Zone => "zone",
            LocationKind::Area => "area",
        }
    }
}

/// Delivery speed code understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum DeliveryType {
    #[default]
    Normal,
    OnDemand,
}

impl From<DeliveryType> for u8 {
    fn from(d: DeliveryType) -> u8 {
        match d {
            DeliveryType::Normal => 48,
            DeliveryType::OnDemand => 12,
        }
    }
}

impl TryFrom<u8> for DeliveryType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            48 => Ok(DeliveryType::Normal),
            12 => Ok(DeliveryType::OnDemand),
            other => Err(format!("unknown delivery type code {}", other)),
        }
    }
}

/// Item category code understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum ItemType {
    Document,
    #[default]
    Parcel,
}

impl From<ItemType> for u8 {
    fn from(i: ItemType) -> u8 {
        match i {
            ItemType::Document => 1,
            ItemType::Parcel => 2,
        }
    }
}

impl TryFrom<u8> for ItemType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ItemType::Document),
            2 => Ok(ItemType::Parcel),
            other => Err(format!("unknown item type code {}", other)),
        }
    }
}

/// Body of `POST /orders` on the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub store_id: i64,
    /// Our order reference, echoed back by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_phone: Option<String>,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub recipient_city: i64,
    pub recipient_zone: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_area: Option<i64>,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instruction: Option<String>,
    pub item_quantity: u32,
    /// Kilograms.
    pub item_weight: f64,
    /// Cash to collect on delivery, in whole currency units.
    pub amount_to_collect: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_description: Option<String>,
}

impl ShipmentRequest {
    /// Rejects requests the provider would bounce anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.recipient_name.trim().is_empty() {
            return Err("recipient_name is required".into());
        }
        if self.recipient_phone.trim().is_empty() {
            return Err("recipient_phone is required".into());
        }
        if self.recipient_address.trim().is_empty() {
            return Err("recipient_address is required".into());
        }
        if self.item_quantity == 0 {
            return Err("item_quantity must be at least 1".into());
        }
        if !(self.item_weight > 0.0) {
            return Err("item_weight must be positive".into());
        }
        if self.amount_to_collect < 0 {
            return Err("amount_to_collect cannot be negative".into());
        }
        Ok(())
    }
}
