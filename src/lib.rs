//! Courier sync: library crate for the service binary and integration tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod courier;
pub mod errors;
pub mod models;
pub mod store;
