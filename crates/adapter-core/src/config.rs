//! Adapter configuration types

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default block size for chunked uploads (5 MiB, the smallest non-final S3 part)
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Default replacement for characters the store rejects in keys
pub const DEFAULT_SLUG_SEPARATOR: char = '_';

/// Construction-time settings for the adapter facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Container (bucket) every object lives in
    pub container: String,

    /// Optional namespace prepended to every object key
    pub prefix: Option<String>,

    /// Bytes per uploaded block
    pub chunk_size: usize,

    /// Character substituted for invalid key characters
    pub slug_separator: char,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            container: String::new(),
            prefix: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            slug_separator: DEFAULT_SLUG_SEPARATOR,
        }
    }
}

impl AdapterConfig {
    /// Config for a container with defaults for everything else
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Prefix with surrounding slashes removed, empty when unset
    pub fn normalized_prefix(&self) -> String {
        self.prefix
            .as_deref()
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_default()
    }

    /// Reject settings the adapter cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "container name must not be empty".to_string(),
            });
        }

        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }

        let sep = self.slug_separator;
        if !(sep.is_ascii_lowercase() || sep.is_ascii_digit() || matches!(sep, '_' | '-' | '.')) {
            return Err(Error::InvalidConfig {
                message: format!("slug_separator {sep:?} is not a valid key character"),
            });
        }

        Ok(())
    }
}

/// Settings for the S3-backed blob service client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3ClientConfig {
    /// Optional custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,

    /// AWS region (default: "us-east-1")
    pub region: Option<String>,

    /// Force path-style addressing (required for MinIO)
    pub force_path_style: bool,
}

impl Default for S3ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: Some("us-east-1".to_string()),
            force_path_style: false,
        }
    }
}
