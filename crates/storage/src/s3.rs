//! S3 blob service client
//!
//! Maps the block-blob protocol onto S3:
//! - `begin_upload` → `create_multipart_upload` carrying content type and canned ACL
//! - `put_block` → `upload_part` of that upload
//! - `commit_block_list` → `complete_multipart_upload` (or an empty `put_object`
//!   for zero blocks), which makes the object visible with its final metadata
//! - `delete_objects_by_prefix` → batched `delete_objects`, 1000 keys per request
//! - ACL grants are read back verbatim, so visibility follows S3 semantics
//!
//! Beginning an upload aborts any multipart upload an earlier, abandoned
//! attempt left open for the same key.
//!
//! S3 rejects parts smaller than [`S3BlobClient::MIN_BLOCK_SIZE`] except the
//! last; `min_block_size` reports it so the adapter refuses smaller chunks.

use adapter_core::{Error, Result, S3ClientConfig};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::Builder as S3ConfigBuilder,
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{
        CompletedMultipartUpload, CompletedPart, Delete, ObjectCannedAcl, ObjectIdentifier,
        Permission as S3Permission,
    },
    Client,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use crate::acl::{Acl, CannedAcl, Grant, Grantee, Permission};
use crate::backend::{BlobContent, BlobObject, BlobServiceClient, CommitOptions, ObjectProperties, ObjectReader};
use crate::block::{Block, BlockId};

/// Multipart upload in progress for one key
#[derive(Debug)]
struct PendingUpload {
    upload_id: String,
    parts: Vec<StagedPart>,
}

#[derive(Debug, Clone)]
struct StagedPart {
    block_id: BlockId,
    part_number: i32,
    etag: Option<String>,
}

/// S3-compatible blob service client
///
/// Supports Amazon S3 and S3-compatible services like MinIO.
#[derive(Debug)]
pub struct S3BlobClient {
    client: Client,
    pending: DashMap<String, PendingUpload>,
}

impl S3BlobClient {
    /// Smallest part S3 accepts for any but the last part of an upload (5 MiB)
    pub const MIN_BLOCK_SIZE: usize = 5 * 1024 * 1024;

    /// Most keys a single `delete_objects` request accepts
    pub const DELETE_BATCH_SIZE: usize = 1000;

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            pending: DashMap::new(),
        }
    }

    /// Create a client from the default AWS configuration chain
    pub async fn with_config(config: S3ClientConfig) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(
                config.region.unwrap_or_else(|| "us-east-1".to_string()),
            ))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Self::from_client(Client::from_conf(s3_config_builder.build()))
    }

    /// Create a client for MinIO (convenience constructor)
    pub async fn minio(endpoint: &str) -> Self {
        Self::with_config(S3ClientConfig {
            endpoint_url: Some(endpoint.to_string()),
            force_path_style: true,
            ..Default::default()
        })
        .await
    }

    fn slot(container: &str, key: &str) -> String {
        format!("{container}/{key}")
    }

    async fn create_upload(&self, container: &str, key: &str, options: &CommitOptions) -> Result<String> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(container)
            .key(key)
            .set_content_type(options.content_type.clone())
            .set_acl(options.acl.map(canned))
            .send()
            .await
            .map_err(|e| service_error("create_multipart_upload", key, e))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::service("create_multipart_upload", "no upload_id returned"))?
            .to_string();

        debug!(%key, %upload_id, "Started multipart upload");
        Ok(upload_id)
    }

    /// Abort a multipart upload (best effort, for cleanup)
    async fn abort_upload(&self, container: &str, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(container)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(%key, %upload_id, error = %DisplayErrorContext(&e), "Failed to abort multipart upload");
        }
    }

    /// Upload ID and part number for the next block of `key`
    fn reserve_part(&self, container: &str, key: &str) -> Result<(String, i32)> {
        let pending = self
            .pending
            .get(&Self::slot(container, key))
            .ok_or_else(|| Error::InvalidBlockList {
                key: key.to_string(),
                message: "no multipart upload begun for this key".to_string(),
            })?;
        Ok((pending.upload_id.clone(), pending.parts.len() as i32 + 1))
    }

    async fn delete_batch(&self, container: &str, keys: &[String]) -> Result<usize> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::service("delete_objects", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| Error::service("delete_objects", e))?;

        let output = self
            .client
            .delete_objects()
            .bucket(container)
            .delete(delete)
            .send()
            .await
            .map_err(|e| Error::service("delete_objects", DisplayErrorContext(&e)))?;

        // Quiet mode reports only the keys that failed
        let failed = output.errors();
        if let Some(first) = failed.first() {
            return Err(Error::service(
                "delete_objects",
                format!(
                    "{} of {} keys not deleted, first {:?}: {}",
                    failed.len(),
                    keys.len(),
                    first.key().unwrap_or_default(),
                    first.message().unwrap_or_default()
                ),
            ));
        }

        Ok(keys.len())
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

fn service_error<E>(operation: &str, key: &str, err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    if is_not_found(&err) {
        Error::NotFound {
            path: key.to_string(),
        }
    } else {
        Error::service(operation, DisplayErrorContext(&err))
    }
}

fn to_chrono(at: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}

fn canned(acl: CannedAcl) -> ObjectCannedAcl {
    match acl {
        CannedAcl::Private => ObjectCannedAcl::Private,
        CannedAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn permission(p: &S3Permission) -> Option<Permission> {
    match p {
        S3Permission::Read => Some(Permission::Read),
        S3Permission::Write => Some(Permission::Write),
        S3Permission::ReadAcp => Some(Permission::ReadAcp),
        S3Permission::WriteAcp => Some(Permission::WriteAcp),
        S3Permission::FullControl => Some(Permission::FullControl),
        _ => None,
    }
}

fn properties(
    content_length: Option<i64>,
    content_type: Option<&str>,
    last_modified: Option<&aws_sdk_s3::primitives::DateTime>,
    etag: Option<&str>,
) -> ObjectProperties {
    ObjectProperties {
        content_length: content_length.and_then(|len| u64::try_from(len).ok()),
        content_type: content_type.map(String::from),
        last_modified: last_modified.and_then(to_chrono),
        etag: etag.map(String::from),
    }
}

#[async_trait]
impl BlobServiceClient for S3BlobClient {
    fn min_block_size(&self) -> usize {
        Self::MIN_BLOCK_SIZE
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, container: &str, key: &str) -> Result<bool> {
        match self.head_object(container, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_object(&self, container: &str, key: &str) -> Result<BlobContent> {
        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| service_error("get_object", key, e))?;

        let props = properties(
            output.content_length(),
            output.content_type(),
            output.last_modified(),
            output.e_tag(),
        );
        let body = output.body.collect().await.map_err(|e| Error::Service {
            operation: "get_object".to_string(),
            message: format!("failed to read response body: {e}"),
        })?;

        Ok(BlobContent {
            object: BlobObject {
                name: key.to_string(),
                properties: props,
            },
            body: body.into_bytes(),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head_object(&self, container: &str, key: &str) -> Result<BlobObject> {
        let output = self
            .client
            .head_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| service_error("head_object", key, e))?;

        Ok(BlobObject {
            name: key.to_string(),
            properties: properties(
                output.content_length(),
                output.content_type(),
                output.last_modified(),
                output.e_tag(),
            ),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn open_object(&self, container: &str, key: &str) -> Result<(BlobObject, ObjectReader)> {
        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| service_error("get_object", key, e))?;

        let object = BlobObject {
            name: key.to_string(),
            properties: properties(
                output.content_length(),
                output.content_type(),
                output.last_modified(),
                output.e_tag(),
            ),
        };
        let reader: ObjectReader = Box::pin(output.body.into_async_read());
        Ok((object, reader))
    }

    /// S3 deletes are idempotent, so a HEAD first supplies the not-found case.
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        self.head_object(container, key).await?;

        self.client
            .delete_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| service_error("delete_object", key, e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete_objects_by_prefix(&self, container: &str, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .list_objects(container, prefix)
            .await?
            .into_iter()
            .map(|object| object.name)
            .collect();
        let mut deleted = 0;

        for batch in keys.chunks(Self::DELETE_BATCH_SIZE) {
            match self.delete_batch(container, batch).await {
                Ok(count) => deleted += count,
                Err(e) => {
                    warn!(deleted, remaining = keys.len() - deleted, "Bulk delete stopped");
                    return Err(e);
                }
            }
        }

        debug!(deleted, "Deleted objects by prefix");
        Ok(deleted)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<BlobObject>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(container);

            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::service("list_objects", DisplayErrorContext(&e)))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    results.push(BlobObject {
                        name: key.to_string(),
                        properties: properties(object.size(), None, object.last_modified(), object.e_tag()),
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        debug!(count = results.len(), "Found S3 objects");
        Ok(results)
    }

    #[instrument(skip(self, options), fields(backend = "s3"))]
    async fn begin_upload(&self, container: &str, key: &str, options: &CommitOptions) -> Result<()> {
        let slot = Self::slot(container, key);
        if let Some((_, stale)) = self.pending.remove(&slot) {
            self.abort_upload(container, key, &stale.upload_id).await;
        }

        let upload_id = self.create_upload(container, key, options).await?;
        self.pending.insert(
            slot,
            PendingUpload {
                upload_id,
                parts: Vec::new(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put_block(&self, container: &str, key: &str, block_id: &BlockId, data: Bytes) -> Result<()> {
        let (upload_id, part_number) = self.reserve_part(container, key)?;

        let uploaded = self
            .client
            .upload_part()
            .bucket(container)
            .key(key)
            .upload_id(&upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| service_error("upload_part", key, e))?;

        let staged = StagedPart {
            block_id: block_id.clone(),
            part_number,
            etag: uploaded.e_tag().map(String::from),
        };

        match self.pending.get_mut(&Self::slot(container, key)) {
            Some(mut pending) if pending.upload_id == upload_id => pending.parts.push(staged),
            _ => {
                return Err(Error::InvalidBlockList {
                    key: key.to_string(),
                    message: format!("multipart upload {upload_id} was replaced while staging {block_id}"),
                })
            }
        }

        debug!(%key, part_number, "Uploaded part");
        Ok(())
    }

    #[instrument(skip(self, blocks, options), fields(backend = "s3", blocks = blocks.len()))]
    async fn commit_block_list(
        &self,
        container: &str,
        key: &str,
        blocks: &[Block],
        options: &CommitOptions,
    ) -> Result<BlobObject> {
        let pending = self.pending.remove(&Self::slot(container, key)).map(|(_, p)| p);

        if blocks.is_empty() {
            if let Some(stale) = &pending {
                self.abort_upload(container, key, &stale.upload_id).await;
            }

            self.client
                .put_object()
                .bucket(container)
                .key(key)
                .body(ByteStream::from(Bytes::new()))
                .set_content_type(options.content_type.clone())
                .set_acl(options.acl.map(canned))
                .send()
                .await
                .map_err(|e| service_error("put_object", key, e))?;

            return self.head_object(container, key).await;
        }

        let Some(pending) = pending else {
            return Err(Error::InvalidBlockList {
                key: key.to_string(),
                message: "no staged blocks".to_string(),
            });
        };

        let mut parts = Vec::with_capacity(blocks.len());
        for block in blocks {
            let Some(staged) = pending.parts.iter().find(|p| p.block_id == block.id) else {
                self.abort_upload(container, key, &pending.upload_id).await;
                return Err(Error::InvalidBlockList {
                    key: key.to_string(),
                    message: format!("block {} was never staged", block.id),
                });
            };
            parts.push(
                CompletedPart::builder()
                    .part_number(staged.part_number)
                    .set_e_tag(staged.etag.clone())
                    .build(),
            );
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(container)
            .key(key)
            .upload_id(&pending.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| service_error("complete_multipart_upload", key, e))?;

        debug!(%key, "Completed multipart upload");

        self.head_object(container, key).await
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn copy_object(&self, container: &str, source_key: &str, dest_key: &str) -> Result<BlobObject> {
        self.client
            .copy_object()
            .bucket(container)
            .key(dest_key)
            .copy_source(format!("{container}/{source_key}"))
            .send()
            .await
            .map_err(|e| service_error("copy_object", source_key, e))?;

        self.head_object(container, dest_key).await
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get_object_acl(&self, container: &str, key: &str) -> Result<Acl> {
        let output = self
            .client
            .get_object_acl()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| service_error("get_object_acl", key, e))?;

        let grants = output
            .grants()
            .iter()
            .filter_map(|grant| {
                let grantee = grant.grantee()?;
                let grantee = match (grantee.uri(), grantee.id()) {
                    (Some(uri), _) => Grantee::Group(uri.to_string()),
                    (None, Some(id)) => Grantee::CanonicalUser(id.to_string()),
                    (None, None) => return None,
                };
                Some(Grant {
                    grantee,
                    permission: permission(grant.permission()?)?,
                })
            })
            .collect();

        Ok(Acl {
            owner: output.owner().and_then(|o| o.id()).map(String::from),
            grants,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_object_acl(&self, container: &str, key: &str, acl: CannedAcl) -> Result<()> {
        self.client
            .put_object_acl()
            .bucket(container)
            .key(key)
            .acl(canned(acl))
            .send()
            .await
            .map_err(|e| service_error("put_object_acl", key, e))?;

        Ok(())
    }
}
