//! # dagmod blockstore
//!
//! Content-addressed block storage underneath the dagmod file mutator.
//!
//! This crate provides:
//! - **Block operations**: Put, get, and delete content-addressed blocks
//! - **DAG nodes**: Serializable nodes with ordered, sized links
//! - **Chunking**: Split byte streams into fixed-size blocks
//! - **CID generation**: Create content identifiers using BLAKE3
//! - **Pinning**: Protect nodes from garbage collection
//! - **Caching**: In-memory LRU cache for hot blocks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         DagModifier (dagmod-core)       │
//! ├─────────────────────────────────────────┤
//! │     BlockStore Trait   │ Pinner Trait   │
//! ├──────────────┬─────────┴───┬────────────┤
//! │ MemoryStore  │ CachedStore │  FsStore   │
//! └──────────────┴─────────────┴────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dagmod_blockstore::{BlockStore, MemoryBlockStore};
//!
//! let store = MemoryBlockStore::new();
//! let cid = store.put_block(&data).await?;
//! let retrieved = store.get_block(&cid).await?;
//! ```

pub mod block;
pub mod chunker;
pub mod cid_utils;
pub mod error;
pub mod fs;
pub mod memory;
pub mod pinning;

pub use block::{DagLink, DagNode};
pub use chunker::{BlockSplitter, Blocks, Chunker, ChunkerConfig};
pub use cid_utils::{create_cid, CidCodec};
pub use error::{BlockStoreError, Result};
pub use fs::FsBlockStore;
pub use memory::{CachedBlockStore, MemoryBlockStore};
pub use pinning::{MemoryPinner, PinMode, Pinner};

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use std::sync::Arc;

/// Default chunk size (256 KB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Maximum block size (1 MB)
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024;

/// Trait for block storage backends
///
/// Puts are idempotent: storing the same bytes twice yields the same CID.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a block and return its CID
    async fn put_block(&self, data: &[u8]) -> Result<Cid>;

    /// Retrieve a block by CID
    async fn get_block(&self, cid: &Cid) -> Result<Bytes>;

    /// Check if a block exists
    async fn has_block(&self, cid: &Cid) -> Result<bool>;

    /// Delete a block
    async fn delete_block(&self, cid: &Cid) -> Result<()>;

    /// Get block size without retrieving content
    async fn block_size(&self, cid: &Cid) -> Result<u64>;

    /// Store raw IPLD data
    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid>;

    /// Retrieve and deserialize IPLD data
    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T>;
}

#[async_trait]
impl<S: BlockStore> BlockStore for Arc<S> {
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        (**self).put_block(data).await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        (**self).get_block(cid).await
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        (**self).has_block(cid).await
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        (**self).delete_block(cid).await
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        (**self).block_size(cid).await
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        (**self).put_ipld(data).await
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        (**self).get_ipld(cid).await
    }
}
