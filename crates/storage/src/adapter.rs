//! Filesystem-style facade over a block-blob service
//!
//! Every operation maps its logical path through [`PathNormalizer`], calls the
//! injected [`BlobServiceClient`] (or the [`ChunkedUploader`] for writes) and
//! normalizes the response into a [`StorageRecord`].
//!
//! Nothing here is transactional. `rename` is copy-then-delete and
//! `delete_dir` is a bulk prefix delete; both report a partially applied
//! state instead of hiding it.

use std::sync::Arc;

use adapter_core::{AdapterConfig, Error, Result, StorageRecord, Visibility};
use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::{debug, instrument, warn};

use crate::acl::CannedAcl;
use crate::backend::{BlobServiceClient, CommitOptions, ObjectReader};
use crate::metadata::{directory, emulate_directories, normalize};
use crate::path::PathNormalizer;
use crate::upload::ChunkedUploader;

/// Caller-supplied options for `write` and `update`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Visibility to apply; `write` defaults to private, `update` keeps the current one
    pub visibility: Option<Visibility>,
    /// Content type; guessed from the path extension when absent
    pub mimetype: Option<String>,
}

impl WriteOptions {
    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility: Some(visibility),
            mimetype: None,
        }
    }

    pub fn public() -> Self {
        Self::with_visibility(Visibility::Public)
    }

    pub fn private() -> Self {
        Self::with_visibility(Visibility::Private)
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }
}

/// Contents and metadata returned by `read`
#[derive(Debug, Clone)]
pub struct ReadOutput {
    pub record: StorageRecord,
    pub contents: Bytes,
}

/// Metadata plus an open reader, returned by `read_stream`
pub struct StreamOutput {
    pub record: StorageRecord,
    pub reader: ObjectReader,
}

/// Result of a best-effort directory delete
#[derive(Debug)]
pub enum DeleteDirOutcome {
    /// Every object under the directory was removed
    Completed { deleted: usize },
    /// The bulk delete stopped with an error; some objects may already be gone
    Interrupted { error: Error },
}

impl DeleteDirOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DeleteDirOutcome::Completed { .. })
    }
}

/// Storage adapter exposing path-based file operations over a blob container
#[derive(Clone)]
pub struct BlobAdapter {
    client: Arc<dyn BlobServiceClient>,
    container: String,
    paths: PathNormalizer,
    uploader: ChunkedUploader,
}

impl BlobAdapter {
    /// Create an adapter over an injected client
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the configuration fails validation or
    /// the chunk size is below the smallest block the client accepts
    pub fn new(client: Arc<dyn BlobServiceClient>, config: AdapterConfig) -> Result<Self> {
        config.validate()?;

        let min_block_size = client.min_block_size();
        if config.chunk_size < min_block_size {
            return Err(Error::InvalidConfig {
                message: format!(
                    "chunk_size {} is below the client's minimum block size of {min_block_size} bytes",
                    config.chunk_size
                ),
            });
        }

        let uploader = ChunkedUploader::new(client.clone(), config.container.clone(), config.chunk_size);
        Ok(Self {
            paths: PathNormalizer::from_config(&config),
            container: config.container,
            client,
            uploader,
        })
    }

    /// Object key a logical path resolves to
    pub fn object_key(&self, path: &str) -> String {
        self.paths.object_key(path)
    }

    /// Check whether an object exists at `path`
    ///
    /// Service failures are logged and reported as absent.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn has(&self, path: &str) -> bool {
        let key = self.paths.object_key(path);
        match self.client.exists(&self.container, &key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(%key, error = %e, "Existence check failed, reporting absent");
                false
            }
        }
    }

    /// Write `contents` to `path`, replacing any existing object
    pub async fn write(&self, path: &str, contents: Bytes, options: WriteOptions) -> Result<StorageRecord> {
        self.write_stream(path, std::io::Cursor::new(contents), options)
            .await
    }

    /// Stream `reader` to `path` in blocks, replacing any existing object
    #[instrument(skip(self, reader, options), fields(container = %self.container))]
    pub async fn write_stream<R>(&self, path: &str, reader: R, options: WriteOptions) -> Result<StorageRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let key = self.paths.object_key(path);
        let visibility = options.visibility.unwrap_or_default();
        let mimetype = options.mimetype.or_else(|| guess_mimetype(path));

        let commit = CommitOptions {
            content_type: mimetype.clone(),
            acl: Some(CannedAcl::from(visibility)),
        };

        let receipt = self
            .uploader
            .upload(reader, &key, &commit)
            .await
            .map_err(|e| e.with_path(path))?;

        let mut record = normalize(&receipt.object, Some(path));
        record.size = record.size.or(Some(receipt.size()));
        record.mimetype = record.mimetype.or(mimetype);
        debug!(%key, size = ?record.size, %visibility, "Wrote object");

        Ok(record.with_visibility(visibility))
    }

    /// Replace the contents of `path`
    ///
    /// Without an explicit visibility the object's current visibility is kept
    /// (private if nothing exists yet).
    pub async fn update(&self, path: &str, contents: Bytes, options: WriteOptions) -> Result<StorageRecord> {
        self.update_stream(path, std::io::Cursor::new(contents), options)
            .await
    }

    /// Streaming form of [`update`](Self::update)
    #[instrument(skip(self, reader, options), fields(container = %self.container))]
    pub async fn update_stream<R>(&self, path: &str, reader: R, mut options: WriteOptions) -> Result<StorageRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        if options.visibility.is_none() {
            let current = self.get_visibility(path).await;
            debug!(%current, "Keeping current visibility");
            options.visibility = Some(current);
        }

        self.write_stream(path, reader, options).await
    }

    /// Read the whole object at `path`
    ///
    /// # Errors
    /// Returns `Error::NotFound` if nothing exists at `path`
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn read(&self, path: &str) -> Result<ReadOutput> {
        let key = self.paths.object_key(path);
        let content = self
            .client
            .get_object(&self.container, &key)
            .await
            .map_err(|e| e.with_path(path))?;

        Ok(ReadOutput {
            record: normalize(&content.object, Some(path)),
            contents: content.body,
        })
    }

    /// Open the object at `path` for sequential reading
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn read_stream(&self, path: &str) -> Result<StreamOutput> {
        let key = self.paths.object_key(path);
        let (object, reader) = self
            .client
            .open_object(&self.container, &key)
            .await
            .map_err(|e| e.with_path(path))?;

        Ok(StreamOutput {
            record: normalize(&object, Some(path)),
            reader,
        })
    }

    /// Copy `path` to `new_path`, carrying the source's visibility over
    ///
    /// Paths that slug to the same key leave the store untouched.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn copy(&self, path: &str, new_path: &str) -> Result<StorageRecord> {
        let source_key = self.paths.object_key(path);
        let dest_key = self.paths.object_key(new_path);

        if source_key == dest_key {
            debug!(%source_key, "Source and destination share a key, nothing to copy");
            let record = self.get_metadata(new_path).await?;
            let visibility = self.get_visibility(new_path).await;
            return Ok(record.with_visibility(visibility));
        }

        let visibility = self.get_visibility(path).await;

        let copied = self
            .client
            .copy_object(&self.container, &source_key, &dest_key)
            .await
            .map_err(|e| e.with_path(path))?;

        if let Err(e) = self
            .client
            .put_object_acl(&self.container, &dest_key, CannedAcl::from(visibility))
            .await
        {
            warn!(%dest_key, error = %e, "Copied object but could not apply visibility");
            return Err(Error::PartialOperation {
                operation: "copy".to_string(),
                completed: format!("copy to {new_path}"),
                failed: format!("setting visibility {visibility} on {new_path}"),
                message: e.to_string(),
            });
        }

        Ok(normalize(&copied, Some(new_path)).with_visibility(visibility))
    }

    /// Move `path` to `new_path` by copying and then deleting the original
    ///
    /// # Errors
    /// A failed copy leaves the store untouched and is returned as is. A failed
    /// delete after a successful copy returns `Error::PartialOperation`; the
    /// object then exists at both paths.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn rename(&self, path: &str, new_path: &str) -> Result<StorageRecord> {
        let record = self.copy(path, new_path).await?;

        let source_key = self.paths.object_key(path);
        if source_key == self.paths.object_key(new_path) {
            return Ok(record);
        }

        if let Err(e) = self.client.delete_object(&self.container, &source_key).await {
            warn!(%source_key, error = %e, "Rename copied but could not delete source");
            return Err(Error::PartialOperation {
                operation: "rename".to_string(),
                completed: format!("copy to {new_path}"),
                failed: format!("delete of {path}"),
                message: e.to_string(),
            });
        }

        Ok(record)
    }

    /// Delete the object at `path`
    ///
    /// # Errors
    /// Returns `Error::NotFound` if nothing exists at `path`
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        let key = self.paths.object_key(path);
        self.client
            .delete_object(&self.container, &key)
            .await
            .map_err(|e| e.with_path(path))
    }

    /// Delete every object under directory `path`
    ///
    /// Best effort: failures are reported in the outcome, never as an error.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn delete_dir(&self, path: &str) -> DeleteDirOutcome {
        let prefix = self.paths.directory_prefix(path);
        match self
            .client
            .delete_objects_by_prefix(&self.container, &prefix)
            .await
        {
            Ok(deleted) => {
                debug!(%prefix, deleted, "Deleted directory");
                DeleteDirOutcome::Completed { deleted }
            }
            Err(error) => {
                warn!(%prefix, %error, "Directory delete interrupted");
                DeleteDirOutcome::Interrupted { error }
            }
        }
    }

    /// Describe a directory; the store has no directory objects, so nothing is written
    pub fn create_dir(&self, path: &str) -> StorageRecord {
        directory(path)
    }

    /// Full metadata record for `path`
    ///
    /// # Errors
    /// Returns `Error::NotFound` if nothing exists at `path`
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn get_metadata(&self, path: &str) -> Result<StorageRecord> {
        let key = self.paths.object_key(path);
        let object = self
            .client
            .head_object(&self.container, &key)
            .await
            .map_err(|e| e.with_path(path))?;

        Ok(normalize(&object, Some(path)))
    }

    /// Same record as [`get_metadata`](Self::get_metadata)
    pub async fn get_mimetype(&self, path: &str) -> Result<StorageRecord> {
        self.get_metadata(path).await
    }

    /// Same record as [`get_metadata`](Self::get_metadata)
    pub async fn get_size(&self, path: &str) -> Result<StorageRecord> {
        self.get_metadata(path).await
    }

    /// Same record as [`get_metadata`](Self::get_metadata)
    pub async fn get_timestamp(&self, path: &str) -> Result<StorageRecord> {
        self.get_metadata(path).await
    }

    /// Public iff anonymous users hold read access
    ///
    /// Never fails: a missing object or an unreadable ACL is logged and
    /// reported as private.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn get_visibility(&self, path: &str) -> Visibility {
        let key = self.paths.object_key(path);
        match self.client.get_object_acl(&self.container, &key).await {
            Ok(acl) => acl.visibility(),
            Err(e) => {
                warn!(%key, error = %e, "Could not read ACL, reporting private");
                Visibility::Private
            }
        }
    }

    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn set_visibility(&self, path: &str, visibility: Visibility) -> Result<Visibility> {
        let key = self.paths.object_key(path);
        self.client
            .put_object_acl(&self.container, &key, CannedAcl::from(visibility))
            .await
            .map_err(|e| e.with_path(path))?;

        Ok(visibility)
    }

    /// Every object in the adapter's namespace, with emulated directories
    pub async fn list_contents(&self) -> Result<Vec<StorageRecord>> {
        self.list_directory("", true).await
    }

    /// Records under `dir`
    ///
    /// Non-recursive listings keep only direct children: files in `dir` and
    /// the emulated directories one level below it.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn list_directory(&self, dir: &str, recursive: bool) -> Result<Vec<StorageRecord>> {
        let prefix = self.paths.directory_prefix(dir);
        let objects = self.client.list_objects(&self.container, &prefix).await?;

        let files = objects
            .iter()
            .filter_map(|object| {
                self.paths
                    .strip_prefix(&object.name)
                    .map(|path| normalize(object, Some(path)))
            })
            .collect();

        let base = self.paths.slug(dir.trim_end_matches('/'));
        let listed: Vec<StorageRecord> = emulate_directories(files)
            .into_iter()
            .filter(|record| is_listed(&base, &record.path, recursive))
            .collect();

        debug!(%prefix, count = listed.len(), "Listed contents");
        Ok(listed)
    }
}

/// Whether `path` belongs in a listing of `base`
fn is_listed(base: &str, path: &str, recursive: bool) -> bool {
    let rest = if base.is_empty() {
        path
    } else {
        match path.strip_prefix(base).and_then(|r| r.strip_prefix('/')) {
            Some(rest) => rest,
            None => return false,
        }
    };

    !rest.is_empty() && (recursive || !rest.contains('/'))
}

fn guess_mimetype(path: &str) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}
