//! HTTP API handlers for shelf-recommend

pub mod catalog;
pub mod health;
pub mod recommend;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use recommend::recommend_routes;
