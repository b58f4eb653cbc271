//! Chunked block upload
//!
//! Streams content into the store as an ordered list of blocks:
//! - Pre-delete of any object already at the key (only "not found" is tolerated)
//! - `begin_upload` with the content type and ACL the object will carry
//! - One `put_block` per chunk, IDs `000001`, `000002`, ... (base64)
//! - A single `commit_block_list` that makes the object visible
//!
//! Uncommitted blocks left by a failed upload are invisible until referenced
//! by a commit. There is no resume: a failed upload restarts at block 1.

use std::sync::Arc;

use adapter_core::{Error, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

use crate::backend::{BlobObject, BlobServiceClient, CommitOptions};
use crate::block::{Block, BlockId, BLOCK_ID_WIDTH};

/// Highest sequence number that fits the fixed-width block ID
const MAX_BLOCKS: u32 = 10u32.pow(BLOCK_ID_WIDTH as u32) - 1;

/// Outcome of the delete-before-upload step
#[derive(Debug)]
pub enum PreDelete {
    Deleted,
    NotFound,
    Failed(Error),
}

/// Blocks staged so far for one upload call
#[derive(Debug)]
pub struct UploadSession {
    object_key: String,
    blocks: Vec<Block>,
    chunk_size: usize,
}

impl UploadSession {
    pub fn new(object_key: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            object_key: object_key.into(),
            blocks: Vec::new(),
            chunk_size,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// ID the next staged block will carry
    pub fn next_block_id(&self) -> Result<BlockId> {
        let next = self.blocks.len() as u64 + 1;
        if next > MAX_BLOCKS as u64 {
            return Err(Error::InvalidBlockList {
                key: self.object_key.clone(),
                message: format!(
                    "content needs more than {MAX_BLOCKS} blocks of {} bytes",
                    self.chunk_size
                ),
            });
        }
        Ok(BlockId::sequence(next as u32))
    }

    fn record(&mut self, id: BlockId, size: u64) {
        self.blocks.push(Block::uncommitted(id, size));
    }

    fn into_committed(self) -> Vec<Block> {
        self.blocks.into_iter().map(Block::committed).collect()
    }
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Object descriptor returned by the commit
    pub object: BlobObject,
    /// Committed blocks in commit order
    pub blocks: Vec<Block>,
}

impl UploadReceipt {
    /// Total bytes across all committed blocks
    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

/// Uploads readers as block blobs through a blob service client
#[derive(Clone)]
pub struct ChunkedUploader {
    client: Arc<dyn BlobServiceClient>,
    container: String,
    chunk_size: usize,
}

impl ChunkedUploader {
    pub fn new(client: Arc<dyn BlobServiceClient>, container: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            client,
            container: container.into(),
            chunk_size,
        }
    }

    /// Delete whatever currently lives at `key`, classifying the result
    pub async fn pre_delete(&self, key: &str) -> PreDelete {
        match self.client.delete_object(&self.container, key).await {
            Ok(()) => PreDelete::Deleted,
            Err(e) if e.is_not_found() => PreDelete::NotFound,
            Err(e) => PreDelete::Failed(e),
        }
    }

    /// Replace the object at `key` with the full contents of `reader`
    ///
    /// The reader is consumed to end-of-stream and dropped on every exit path.
    ///
    /// # Errors
    /// Any pre-delete failure other than "not found", any read error, and any
    /// `put_block`/`commit_block_list` failure aborts the upload.
    #[instrument(skip(self, reader, options), fields(container = %self.container, chunk_size = self.chunk_size))]
    pub async fn upload<R>(&self, mut reader: R, key: &str, options: &CommitOptions) -> Result<UploadReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        match self.pre_delete(key).await {
            PreDelete::Deleted => debug!(%key, "Removed existing object before upload"),
            PreDelete::NotFound => debug!(%key, "No existing object to replace"),
            PreDelete::Failed(e) => {
                warn!(%key, error = %e, "Pre-upload delete failed, aborting upload");
                return Err(e);
            }
        }

        self.client
            .begin_upload(&self.container, key, options)
            .await?;

        let mut session = UploadSession::new(key, self.chunk_size);

        loop {
            let chunk = read_chunk(&mut reader, self.chunk_size).await?;
            if chunk.is_empty() {
                break;
            }

            let block_id = session.next_block_id()?;
            let size = chunk.len() as u64;
            self.client
                .put_block(&self.container, key, &block_id, chunk)
                .await?;

            debug!(%key, block = session.blocks().len() + 1, %block_id, size, "Staged block");
            session.record(block_id, size);
        }

        let object = self
            .client
            .commit_block_list(&self.container, key, session.blocks(), options)
            .await?;

        let blocks = session.into_committed();
        info!(%key, blocks = blocks.len(), "Committed block list");

        Ok(UploadReceipt { object, blocks })
    }
}

/// Read until `chunk_size` bytes are buffered or the reader hits end-of-stream
async fn read_chunk<R>(reader: &mut R, chunk_size: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; chunk_size];
    let mut filled = 0;

    while filled < chunk_size {
        let n = reader.read(&mut chunk[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    chunk.truncate(filled);
    Ok(Bytes::from(chunk))
}
