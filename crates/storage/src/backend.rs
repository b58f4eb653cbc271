//! Blob service client trait definition
//!
//! Defines the primitive operations the adapter needs from a remote
//! block-blob service. Every client must report a missing key as
//! [`Error::NotFound`] so the facade can tell "missing" from other failures.

use std::io::Cursor;
use std::pin::Pin;

use adapter_core::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::acl::{Acl, CannedAcl};
use crate::block::{Block, BlockId};

/// Sequential reader over an object's body
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Properties the service reports for one object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectProperties {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Object name (full key) plus its properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub name: String,
    pub properties: ObjectProperties,
}

/// Object descriptor together with its body
#[derive(Debug, Clone)]
pub struct BlobContent {
    pub object: BlobObject,
    pub body: Bytes,
}

/// Content type and ACL the committed object should carry
///
/// Handed to [`BlobServiceClient::begin_upload`] before the first block is
/// staged and again to the commit, so a client may apply them at either point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub content_type: Option<String>,
    pub acl: Option<CannedAcl>,
}

/// Async trait for block-blob services
///
/// All keys are full object keys (prefix and slug already applied);
/// the client never sees logical paths.
#[async_trait]
pub trait BlobServiceClient: Send + Sync {
    /// Smallest block the service accepts for any but the last block of a list
    fn min_block_size(&self) -> usize {
        1
    }

    /// Check whether an object exists
    async fn exists(&self, container: &str, key: &str) -> Result<bool>;

    /// Fetch an object's properties and body
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the key doesn't exist
    async fn get_object(&self, container: &str, key: &str) -> Result<BlobContent>;

    /// Fetch properties only
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the key doesn't exist
    async fn head_object(&self, container: &str, key: &str) -> Result<BlobObject>;

    /// Open an object for sequential reading
    ///
    /// The default buffers the whole body through [`get_object`](Self::get_object);
    /// clients with a native streaming body should override it.
    async fn open_object(&self, container: &str, key: &str) -> Result<(BlobObject, ObjectReader)> {
        let content = self.get_object(container, key).await?;
        let reader: ObjectReader = Box::pin(Cursor::new(content.body));
        Ok((content.object, reader))
    }

    /// Delete one object
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the key doesn't exist
    async fn delete_object(&self, container: &str, key: &str) -> Result<()>;

    /// Delete every object whose key starts with `prefix`
    ///
    /// Not transactional: an error may arrive after some objects are gone.
    ///
    /// # Returns
    /// Number of objects deleted
    async fn delete_objects_by_prefix(&self, container: &str, prefix: &str) -> Result<usize>;

    /// List all objects whose key starts with `prefix` (empty = whole container)
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<BlobObject>>;

    /// Start a fresh upload for `key`, discarding blocks staged by earlier attempts
    ///
    /// Called once per upload, before the first `put_block`. Nothing becomes
    /// visible until the commit.
    async fn begin_upload(&self, container: &str, key: &str, options: &CommitOptions) -> Result<()>;

    /// Stage one uncommitted block for `key`
    async fn put_block(&self, container: &str, key: &str, block_id: &BlockId, data: Bytes)
        -> Result<()>;

    /// Atomically make the ordered block list the content of `key`
    ///
    /// # Errors
    /// Returns `Error::InvalidBlockList` if a listed block was never staged
    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[Block],
        options: &CommitOptions,
    ) -> Result<BlobObject>;

    /// Server-side copy within the container
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the source doesn't exist
    async fn copy_object(&self, container: &str, source_key: &str, dest_key: &str)
        -> Result<BlobObject>;

    /// Read an object's grants
    async fn get_object_acl(&self, container: &str, key: &str) -> Result<Acl>;

    /// Replace an object's grants with a canned ACL
    async fn put_object_acl(&self, container: &str, key: &str, acl: CannedAcl) -> Result<()>;
}
