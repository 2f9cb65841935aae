//! # ShelfSense Common Library
//!
//! Shared code for the ShelfSense services:
//! - Error type used across crates
//! - Configuration loading (TOML file, environment, compiled defaults)

pub mod config;
pub mod error;

pub use config::ShelfConfig;
pub use error::{Error, Result};
