//! HTTP route handlers.

pub mod database;
pub mod health;
pub mod images;
pub mod metrics;
