//! In-memory block-blob service
//!
//! Models the parts of the block-blob protocol the adapter relies on:
//! - Staged (uncommitted) blocks per key, invisible until committed
//! - Commits that replace the object and discard the key's staged blocks
//! - Per-object ACLs, content types and last-modified stamps
//! - One-shot fault injection per operation, for exercising failure paths
//! - An optional minimum size for non-final blocks, as S3 enforces for parts

use std::collections::{BTreeMap, HashMap, VecDeque};

use adapter_core::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::acl::{Acl, CannedAcl};
use crate::backend::{BlobContent, BlobObject, BlobServiceClient, CommitOptions, ObjectProperties};
use crate::block::{Block, BlockId};

/// Owner ID recorded on every object's ACL
const MEMORY_OWNER: &str = "memory-owner";

/// Client operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Exists,
    BeginUpload,
    GetObject,
    HeadObject,
    DeleteObject,
    DeleteByPrefix,
    ListObjects,
    PutBlock,
    CommitBlockList,
    CopyObject,
    GetAcl,
    PutAcl,
}

/// A queued failure; bulk deletes remove `after` objects before failing
#[derive(Debug)]
struct Fault {
    after: usize,
    message: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    blocks: Vec<BlockId>,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    etag: String,
    acl: Acl,
}

impl StoredObject {
    fn describe(&self, key: &str) -> BlobObject {
        BlobObject {
            name: key.to_string(),
            properties: ObjectProperties {
                content_length: Some(self.body.len() as u64),
                content_type: self.content_type.clone(),
                last_modified: Some(self.last_modified),
                etag: Some(self.etag.clone()),
            },
        }
    }
}

#[derive(Debug, Default)]
struct Container {
    objects: BTreeMap<String, StoredObject>,
    staged: HashMap<String, HashMap<BlockId, Bytes>>,
}

/// Block-blob store held entirely in process memory
///
/// Containers are created on first write. Objects list in key order.
#[derive(Debug, Default)]
pub struct MemoryBlobClient {
    containers: RwLock<HashMap<String, Container>>,
    faults: Mutex<HashMap<FaultOp, VecDeque<Fault>>>,
    min_block_size: usize,
}

impl MemoryBlobClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject commits whose non-final blocks are smaller than `size` bytes
    pub fn with_min_block_size(mut self, size: usize) -> Self {
        self.min_block_size = size;
        self
    }

    /// Make the next call of `op` fail with a service error carrying `message`
    ///
    /// Faults queue up: injecting twice fails the next two calls.
    pub fn inject_fault(&self, op: FaultOp, message: impl Into<String>) {
        self.inject_fault_after(op, 0, message);
    }

    /// Like [`inject_fault`](Self::inject_fault), but a bulk delete first
    /// removes `after` matching objects. Other operations fail immediately.
    pub fn inject_fault_after(&self, op: FaultOp, after: usize, message: impl Into<String>) {
        self.faults.lock().entry(op).or_default().push_back(Fault {
            after,
            message: message.into(),
        });
    }

    fn take_fault(&self, op: FaultOp) -> Option<Fault> {
        self.faults.lock().get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn check_fault(&self, op: FaultOp) -> Result<()> {
        match self.take_fault(op) {
            Some(fault) => Err(fault_error(op, fault)),
            None => Ok(()),
        }
    }

    /// Committed block IDs of an object, in commit order
    pub fn committed_blocks(&self, container: &str, key: &str) -> Option<Vec<BlockId>> {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(|o| o.blocks.clone())
    }

    /// Staged blocks not yet referenced by a commit
    pub fn uncommitted_block_count(&self, container: &str, key: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.staged.get(key))
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of committed objects in a container
    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map(|c| c.objects.len())
            .unwrap_or(0)
    }

    /// Overwrite an object's grants verbatim
    pub fn replace_acl(&self, container: &str, key: &str, acl: Acl) -> Result<()> {
        let mut containers = self.containers.write();
        let object = containers
            .get_mut(container)
            .and_then(|c| c.objects.get_mut(key))
            .ok_or_else(|| not_found(key))?;
        object.acl = acl;
        Ok(())
    }

    fn with_object<T>(&self, container: &str, key: &str, f: impl FnOnce(&StoredObject) -> T) -> Result<T> {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.objects.get(key))
            .map(f)
            .ok_or_else(|| not_found(key))
    }
}

fn not_found(key: &str) -> Error {
    Error::NotFound {
        path: key.to_string(),
    }
}

fn fault_error(op: FaultOp, fault: Fault) -> Error {
    Error::service(format!("{op:?}"), fault.message)
}

fn new_etag() -> String {
    format!("\"{}\"", Uuid::new_v4().simple())
}

#[async_trait]
impl BlobServiceClient for MemoryBlobClient {
    fn min_block_size(&self) -> usize {
        self.min_block_size.max(1)
    }

    async fn exists(&self, container: &str, key: &str) -> Result<bool> {
        self.check_fault(FaultOp::Exists)?;
        Ok(self.with_object(container, key, |_| ()).is_ok())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_object(&self, container: &str, key: &str) -> Result<BlobContent> {
        self.check_fault(FaultOp::GetObject)?;
        self.with_object(container, key, |o| BlobContent {
            object: o.describe(key),
            body: o.body.clone(),
        })
    }

    async fn head_object(&self, container: &str, key: &str) -> Result<BlobObject> {
        self.check_fault(FaultOp::HeadObject)?;
        self.with_object(container, key, |o| o.describe(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        self.check_fault(FaultOp::DeleteObject)?;
        let mut containers = self.containers.write();
        containers
            .get_mut(container)
            .and_then(|c| c.objects.remove(key))
            .map(|_| ())
            .ok_or_else(|| not_found(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_objects_by_prefix(&self, container: &str, prefix: &str) -> Result<usize> {
        let fault = self.take_fault(FaultOp::DeleteByPrefix);
        let mut containers = self.containers.write();
        let Some(c) = containers.get_mut(container) else {
            return match fault {
                Some(fault) => Err(fault_error(FaultOp::DeleteByPrefix, fault)),
                None => Ok(0),
            };
        };

        let matching: Vec<String> = c
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        let limit = fault.as_ref().map_or(matching.len(), |f| f.after.min(matching.len()));

        for key in &matching[..limit] {
            c.objects.remove(key);
        }
        debug!(deleted = limit, matching = matching.len(), "Deleted objects by prefix");

        match fault {
            Some(fault) => Err(fault_error(FaultOp::DeleteByPrefix, fault)),
            None => Ok(limit),
        }
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<BlobObject>> {
        self.check_fault(FaultOp::ListObjects)?;
        let containers = self.containers.read();
        let Some(c) = containers.get(container) else {
            return Ok(Vec::new());
        };

        Ok(c.objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, o)| o.describe(key))
            .collect())
    }

    async fn begin_upload(&self, container: &str, key: &str, _options: &CommitOptions) -> Result<()> {
        self.check_fault(FaultOp::BeginUpload)?;
        self.containers
            .write()
            .entry(container.to_string())
            .or_default()
            .staged
            .remove(key);
        Ok(())
    }

    async fn put_block(&self, container: &str, key: &str, block_id: &BlockId, data: Bytes) -> Result<()> {
        self.check_fault(FaultOp::PutBlock)?;
        self.containers
            .write()
            .entry(container.to_string())
            .or_default()
            .staged
            .entry(key.to_string())
            .or_default()
            .insert(block_id.clone(), data);
        Ok(())
    }

    #[instrument(skip(self, blocks, options), fields(backend = "memory", blocks = blocks.len()))]
    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[Block],
        options: &CommitOptions,
    ) -> Result<BlobObject> {
        self.check_fault(FaultOp::CommitBlockList)?;
        let mut containers = self.containers.write();
        let c = containers.entry(container.to_string()).or_default();

        let staged = c.staged.get(key);
        let min_block_size = self.min_block_size();
        let mut body = BytesMut::new();
        for (idx, block) in blocks.iter().enumerate() {
            let data = staged
                .and_then(|s| s.get(&block.id))
                .ok_or_else(|| Error::InvalidBlockList {
                    key: key.to_string(),
                    message: format!("block {} was never staged", block.id),
                })?;
            if idx + 1 < blocks.len() && data.len() < min_block_size {
                return Err(Error::InvalidBlockList {
                    key: key.to_string(),
                    message: format!(
                        "block {} is {} bytes, below the {min_block_size} byte minimum",
                        block.id,
                        data.len()
                    ),
                });
            }
            body.extend_from_slice(data);
        }
        c.staged.remove(key);

        let acl = options
            .acl
            .unwrap_or(CannedAcl::Private)
            .to_acl(Some(MEMORY_OWNER.to_string()));

        let object = StoredObject {
            body: body.freeze(),
            blocks: blocks.iter().map(|b| b.id.clone()).collect(),
            content_type: options.content_type.clone(),
            last_modified: Utc::now(),
            etag: new_etag(),
            acl,
        };
        let described = object.describe(key);
        c.objects.insert(key.to_string(), object);

        Ok(described)
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn copy_object(&self, container: &str, source_key: &str, dest_key: &str) -> Result<BlobObject> {
        self.check_fault(FaultOp::CopyObject)?;
        let mut containers = self.containers.write();
        let c = containers
            .get_mut(container)
            .ok_or_else(|| not_found(source_key))?;

        let source = c.objects.get(source_key).ok_or_else(|| not_found(source_key))?;

        // Copies start out private, like a fresh upload without an ACL.
        let copy = StoredObject {
            last_modified: Utc::now(),
            etag: new_etag(),
            acl: CannedAcl::Private.to_acl(Some(MEMORY_OWNER.to_string())),
            ..source.clone()
        };
        let described = copy.describe(dest_key);
        c.objects.insert(dest_key.to_string(), copy);

        Ok(described)
    }

    async fn get_object_acl(&self, container: &str, key: &str) -> Result<Acl> {
        self.check_fault(FaultOp::GetAcl)?;
        self.with_object(container, key, |o| o.acl.clone())
    }

    async fn put_object_acl(&self, container: &str, key: &str, acl: CannedAcl) -> Result<()> {
        self.check_fault(FaultOp::PutAcl)?;
        self.replace_acl(container, key, acl.to_acl(Some(MEMORY_OWNER.to_string())))
    }
}
