//! # Autoreduce Common Library
//!
//! Shared code for the autoreduction REST service and its admin commands:
//! - Configuration loading
//! - Database initialization and models
//! - API token helpers
//! - Common error type

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use config::ApiConfig;
pub use error::{Error, Result};
