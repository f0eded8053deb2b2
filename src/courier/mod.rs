//! Integration with the courier provider: token lifecycle, HTTP client,
//! status translation and the tracking orchestrator built on top of them.

pub mod client;
pub mod envelope;
pub mod service;
pub mod status;
pub mod token;

pub use client::CourierClient;
pub use service::CourierService;
pub use token::{Clock, SystemClock, TokenManager};
