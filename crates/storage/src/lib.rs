//! Storage - Filesystem-style adapter over block-blob services
//!
//! Exposes path-based file operations (read, write, rename, delete, list,
//! metadata, visibility) on top of a flat, block-addressed object store:
//! - Chunked uploads committed as ordered block lists
//! - Slugged, prefix-namespaced object keys
//! - Directory emulation over flat key listings
//!
//! Clients:
//! - In-memory block-blob store (always available)
//! - Amazon S3 / S3-compatible storage (with `s3` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use adapter_core::{AdapterConfig, Visibility};
//! use bytes::Bytes;
//! use storage::{BlobAdapter, MemoryBlobClient, WriteOptions};
//!
//! # async fn example() -> adapter_core::Result<()> {
//! let client = Arc::new(MemoryBlobClient::new());
//! let adapter = BlobAdapter::new(client, AdapterConfig::new("media").with_prefix("uploads"))?;
//!
//! adapter.write("Photos/Cat 01.JPG", Bytes::from(vec![1, 2, 3]), WriteOptions::public()).await?;
//! assert_eq!(adapter.get_visibility("Photos/Cat 01.JPG").await, Visibility::Public);
//! # Ok(())
//! # }
//! ```

mod acl;
mod adapter;
mod backend;
mod block;
mod memory;
mod metadata;
mod path;
mod upload;

#[cfg(feature = "s3")]
mod s3;

pub use acl::{Acl, CannedAcl, Grant, Grantee, Permission, ALL_USERS_GROUP};
pub use adapter::{BlobAdapter, DeleteDirOutcome, ReadOutput, StreamOutput, WriteOptions};
pub use backend::{BlobContent, BlobObject, BlobServiceClient, CommitOptions, ObjectProperties, ObjectReader};
pub use block::{Block, BlockId, BlockStatus, BLOCK_ID_WIDTH};
pub use memory::{FaultOp, MemoryBlobClient};
pub use metadata::{directory, emulate_directories, normalize};
pub use path::{resolve_key, sanitize_for_store, PathNormalizer};
pub use upload::{ChunkedUploader, PreDelete, UploadReceipt, UploadSession};

#[cfg(feature = "s3")]
pub use s3::S3BlobClient;
