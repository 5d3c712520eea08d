//! Filesystem-backed block store.
//!
//! Blocks live in a sharded directory tree keyed by the CID string:
//! `{root}/{last 2 chars of cid}/{cid}`. CIDv1 strings share a common prefix,
//! so the shard is taken from the tail where the digest varies.
//!
//! Writes go to a uniquely named temp file first and are renamed into place,
//! so any number of handles can store the same block at once. Reads verify the
//! bytes against their CID. Pins are kept in `pins.json` next to the shards.
//! Pin snapshots are written one at a time and skipped when nothing changed.

use crate::cid_utils::{create_cid, verify_cid, CidCodec};
use crate::pinning::{PinMode, Pinner};
use crate::{BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

const PINS_FILE: &str = "pins.json";

/// Filesystem block store
pub struct FsBlockStore {
    root: PathBuf,
    pins: RwLock<HashMap<String, PinMode>>,
    /// Bumped on every change to `pins`
    pins_version: AtomicU64,
    /// Version last written to disk; held while a snapshot is written
    pins_saved: tokio::sync::Mutex<u64>,
}

/// Write `data` to a fresh temp file in `path`'s directory and rename it over `path`
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.persist(path)?;
    Ok(())
}

async fn write_atomic_blocking(path: PathBuf, data: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &data))
        .await
        .map_err(std::io::Error::other)??;
    Ok(())
}

impl FsBlockStore {
    /// Open (or create) a store rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let pins = match std::fs::read_to_string(root.join(PINS_FILE)) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| BlockStoreError::Deserialization(e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            root,
            pins: RwLock::new(pins),
            pins_version: AtomicU64::new(0),
            pins_saved: tokio::sync::Mutex::new(0),
        })
    }

    /// Directory the store lives in
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        let name = cid.to_string();
        let shard = &name[name.len().saturating_sub(2)..];
        self.root.join(shard).join(name)
    }

    async fn write_block(&self, cid: Cid, data: &[u8]) -> Result<Cid> {
        let path = self.block_path(&cid);
        if tokio::fs::try_exists(&path).await? {
            return Ok(cid);
        }

        // Same CID means same bytes, so a concurrent writer winning the rename is fine
        write_atomic_blocking(path, data.to_vec()).await?;
        debug!(%cid, bytes = data.len(), "stored block");
        Ok(cid)
    }

    async fn read_block(&self, cid: &Cid) -> Result<Bytes> {
        let data = match tokio::fs::read(self.block_path(cid)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BlockStoreError::NotFound(*cid)),
            Err(e) => return Err(e.into()),
        };

        if !verify_cid(&data, cid) {
            let codec = CidCodec::from_code(cid.codec()).unwrap_or_default();
            return Err(BlockStoreError::HashMismatch {
                expected: cid.to_string(),
                actual: create_cid(&data, codec).to_string(),
            });
        }
        Ok(Bytes::from(data))
    }

    /// Record a pin change and persist the pin set
    async fn pins_changed(&self) -> Result<()> {
        self.pins_version.fetch_add(1, Ordering::SeqCst);
        self.save_pins().await
    }

    async fn save_pins(&self) -> Result<()> {
        let mut saved = self.pins_saved.lock().await;
        // Snapshot under the lock so snapshots reach the disk in order
        let (version, json) = {
            let pins = self.pins.read();
            (
                self.pins_version.load(Ordering::SeqCst),
                serde_json::to_vec_pretty(&*pins)?,
            )
        };
        if version <= *saved {
            // An earlier writer already saved this change
            return Ok(());
        }

        write_atomic_blocking(self.root.join(PINS_FILE), json).await?;
        *saved = version;
        debug!(version, "saved pins");
        Ok(())
    }
}

#[async_trait]
impl BlockStore for FsBlockStore {
    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn put_block(&self, data: &[u8]) -> Result<Cid> {
        self.write_block(create_cid(data, CidCodec::Raw), data).await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        self.read_block(cid).await
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.block_path(cid)).await?)
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        match tokio::fs::remove_file(self.block_path(cid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        match tokio::fs::metadata(self.block_path(cid)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlockStoreError::NotFound(*cid)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_ipld<T: serde::Serialize + Send + Sync>(&self, data: &T) -> Result<Cid> {
        let bytes = serde_ipld_dagcbor::to_vec(data)
            .map_err(|e| BlockStoreError::Serialization(e.to_string()))?;
        self.write_block(create_cid(&bytes, CidCodec::DagCbor), &bytes)
            .await
    }

    async fn get_ipld<T: serde::de::DeserializeOwned>(&self, cid: &Cid) -> Result<T> {
        let bytes = self.read_block(cid).await?;
        Ok(serde_ipld_dagcbor::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Pinner for FsBlockStore {
    async fn pin(&self, cid: &Cid, mode: PinMode) -> Result<()> {
        if !self.has_block(cid).await? {
            return Err(BlockStoreError::PinFailed(format!("{cid} is not stored")));
        }
        let changed = {
            let mut pins = self.pins.write();
            match pins.get_mut(&cid.to_string()) {
                None => {
                    pins.insert(cid.to_string(), mode);
                    true
                }
                Some(existing) if *existing == PinMode::Indirect && mode != PinMode::Indirect => {
                    *existing = mode;
                    true
                }
                Some(_) => false,
            }
        };
        if changed {
            self.pins_changed().await?;
        }
        Ok(())
    }

    async fn unpin(&self, cid: &Cid) -> Result<()> {
        let removed = self.pins.write().remove(&cid.to_string()).is_some();
        if removed {
            self.pins_changed().await?;
        }
        Ok(())
    }

    async fn is_pinned(&self, cid: &Cid) -> Result<bool> {
        Ok(self.pins.read().contains_key(&cid.to_string()))
    }
}
