//! # lockbox-core
//!
//! Shared types and utilities for Lockbox.
//!
//! - **Configuration**: Loading, validation, and persistence of the config file
//! - **Secrets**: Zeroizing, redacting wrappers for keys and plaintext
//! - **Utilities**: Path resolution and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

pub use config::Config;
pub use error::{ConfigError, Result};
pub use secret::{SecretKey, SecretString};
