pub mod order;
pub mod shipment;
pub mod token;
