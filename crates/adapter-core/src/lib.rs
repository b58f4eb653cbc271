//! Adapter Core - Foundation for the block-blob storage adapter
//!
//! Provides the error taxonomy, configuration, and the uniform record
//! types shared by the facade and every blob service client.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{AdapterConfig, S3ClientConfig, DEFAULT_CHUNK_SIZE, DEFAULT_SLUG_SEPARATOR};
pub use error::{Error, Result};
pub use types::*;
