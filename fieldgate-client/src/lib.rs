//! fieldgate REST client.
//!
//! `RestPermissionApi` implements [`fieldgate_core::PermissionApi`] over
//! reqwest; `ClientConfig` is the TOML configuration shared with the CLI.

pub mod config;
pub mod error;
pub mod rest;

pub use config::{CacheSettings, ClientConfig, ClientCredentials, ConfigError};
pub use error::RestError;
pub use rest::RestPermissionApi;
