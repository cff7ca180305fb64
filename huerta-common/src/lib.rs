//! # Huerta Common Library
//!
//! Shared code for the huerta services:
//! - Error type and result alias
//! - Configuration file resolution and TOML loading
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
