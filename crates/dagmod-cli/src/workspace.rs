//! File operations behind each subcommand

use crate::config::CliConfig;
use anyhow::{Context, Result};
use cid::Cid;
use dagmod_blockstore::{
    BlockSplitter, BlockStore, CachedBlockStore, Chunker, ChunkerConfig, FsBlockStore, PinMode,
    Pinner,
};
use dagmod_core::{unixfs, DagModifier, Whence};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span};

/// Block store used by the binary
pub type CliStore = CachedBlockStore<Arc<FsBlockStore>>;

/// Summary printed by `stat`
#[derive(Debug, Serialize)]
pub struct FileStat {
    pub cid: String,
    pub size: u64,
    pub children: usize,
    pub depth: usize,
}

/// A block store, a pinner and the settings to open files with
pub struct Workspace<S: BlockStore> {
    store: Arc<S>,
    pinner: Arc<dyn Pinner>,
    config: CliConfig,
}

impl Workspace<CliStore> {
    /// Open the filesystem store named by `config`
    pub fn open(config: CliConfig) -> Result<Self> {
        let fs = Arc::new(
            FsBlockStore::open(&config.store_path)
                .with_context(|| format!("opening store at {}", config.store_path.display()))?,
        );
        let store = Arc::new(CachedBlockStore::new(fs.clone(), config.cache_capacity));
        Ok(Self::new(store, fs, config))
    }
}

impl<S: BlockStore> Workspace<S> {
    pub fn new(store: Arc<S>, pinner: Arc<dyn Pinner>, config: CliConfig) -> Self {
        Self {
            store,
            pinner,
            config,
        }
    }

    fn splitter(&self) -> Result<Arc<dyn BlockSplitter>> {
        let chunker = ChunkerConfig::with_chunk_size(self.config.chunk_size)
            .context("invalid chunk_size")?;
        Ok(Arc::new(Chunker::with_config(chunker)))
    }

    async fn open_file(&self, cid: Option<&Cid>) -> Result<DagModifier<S>> {
        let splitter = self.splitter()?;
        let file = match cid {
            Some(cid) => DagModifier::load(cid, self.store.clone(), self.pinner.clone(), splitter)
                .await
                .with_context(|| format!("loading {}", cid))?,
            None => DagModifier::new(
                &unixfs::empty_file()?,
                self.store.clone(),
                self.pinner.clone(),
                splitter,
            ),
        };

        let span = match cid {
            Some(cid) => info_span!("file", %cid),
            None => info_span!("file", cid = "new"),
        };
        Ok(file
            .with_config(self.config.modifier_config())
            .with_span(span))
    }

    /// Store the new root and pin the whole tree under it
    async fn commit(&self, file: &mut DagModifier<S>) -> Result<Cid> {
        let cid = file.get_root_cid().await?;
        self.pinner.pin(&cid, PinMode::Recursive).await?;
        info!(%cid, "committed");
        Ok(cid)
    }

    /// Store `data` as a new file
    pub async fn import(&self, data: &[u8]) -> Result<Cid> {
        let mut file = self.open_file(None).await?;
        file.write(data).await?;
        self.commit(&mut file).await
    }

    /// Read up to `length` bytes starting at `offset`
    pub async fn cat(&self, cid: &Cid, offset: u64, length: Option<u64>) -> Result<Vec<u8>> {
        let mut file = self.open_file(Some(cid)).await?;
        let size = file.size().await?;
        let start = offset.min(size);
        let end = length.map_or(size, |len| start.saturating_add(len).min(size));

        file.seek(i64::try_from(start)?, Whence::Start).await?;
        let mut out = vec![0u8; usize::try_from(end - start)?];
        let mut filled = 0;
        while filled < out.len() {
            let n = file.read(&mut out[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(out)
    }

    /// Overwrite or extend the file at `offset` and return the new root
    pub async fn write(&self, cid: &Cid, offset: u64, data: &[u8]) -> Result<Cid> {
        let mut file = self.open_file(Some(cid)).await?;
        file.write_at(offset, data).await?;
        self.commit(&mut file).await
    }

    /// Resize the file and return the new root
    pub async fn truncate(&self, cid: &Cid, size: u64) -> Result<Cid> {
        let mut file = self.open_file(Some(cid)).await?;
        file.truncate(size).await?;
        self.commit(&mut file).await
    }

    /// Size and shape of the file
    pub async fn stat(&self, cid: &Cid) -> Result<FileStat> {
        let mut file = self.open_file(Some(cid)).await?;
        let size = file.size().await?;
        let root = file.get_root().await?;

        let mut depth = 0;
        let mut node = root.clone();
        while let Some(first) = node.links.first() {
            let child = first.cid;
            node = self.store.get_ipld(&child).await?;
            depth += 1;
        }

        Ok(FileStat {
            cid: cid.to_string(),
            size,
            children: root.links.len(),
            depth,
        })
    }
}
