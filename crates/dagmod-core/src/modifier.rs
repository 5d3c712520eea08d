//! The file handle: buffered writes, reads and seeks over a mutable DAG file
//!
//! A [`DagModifier`] owns the current root of one file. Writes at the cursor
//! accumulate in a buffer and are materialized by [`DagModifier::flush`]: the
//! editor overwrites existing leaves in place and whatever does not fit is
//! split into new blocks and handed to the appender. Every operation that
//! needs a consistent view of the file flushes first.

use crate::appender::{TreeAppender, DEFAULT_MAX_LINKS};
use crate::editor;
use crate::reader::DagReader;
use crate::truncate;
use crate::unixfs;
use crate::{CoreError, Result};
use bytes::{Bytes, BytesMut};
use cid::Cid;
use dagmod_blockstore::{
    BlockSplitter, BlockStore, Chunker, ChunkerConfig, DagNode, Pinner,
};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, SeekFrom};
use std::sync::Arc;
use tracing::{debug, trace, Span};

/// Buffered bytes above which a write flushes implicitly (2 MiB)
pub const WRITE_BUFFER_SIZE: usize = 1 << 21;

/// Leaf size used when growing a file with zeros
pub const SPARSE_CHUNK_SIZE: usize = 4096;

/// Reference point for [`DagModifier::seek`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file
    Start,
    /// From the current cursor
    Current,
    /// From the end of the file (not supported)
    End,
}

impl TryFrom<i32> for Whence {
    type Error = CoreError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(CoreError::UnrecognizedWhence(other)),
        }
    }
}

/// Tunables of a [`DagModifier`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierConfig {
    /// Buffered bytes above which a write flushes implicitly
    pub write_buffer_size: usize,
    /// Leaf size for zero-filled growth
    pub sparse_chunk_size: usize,
    /// Max links per internal node when appending
    pub max_links: usize,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: WRITE_BUFFER_SIZE,
            sparse_chunk_size: SPARSE_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
        }
    }
}

/// A mutable view of one DAG file.
///
/// The handle is single-writer: every method takes `&mut self`. Nodes are
/// never edited in place; each change stores new nodes and rebinds the root.
pub struct DagModifier<S: BlockStore> {
    store: Arc<S>,
    pinner: Arc<dyn Pinner>,
    splitter: Arc<dyn BlockSplitter>,
    config: ModifierConfig,
    span: Span,

    root: DagNode,
    /// File offset the buffered bytes belong at
    write_start: u64,
    /// Logical position for reads and writes
    cursor: u64,
    buffer: BytesMut,

    reader: Option<DagReader<S>>,
}

impl<S: BlockStore> DagModifier<S> {
    /// Open a handle on a copy of `root`
    pub fn new(
        root: &DagNode,
        store: Arc<S>,
        pinner: Arc<dyn Pinner>,
        splitter: Arc<dyn BlockSplitter>,
    ) -> Self {
        Self {
            store,
            pinner,
            splitter,
            config: ModifierConfig::default(),
            span: Span::none(),
            root: root.clone(),
            write_start: 0,
            cursor: 0,
            buffer: BytesMut::new(),
            reader: None,
        }
    }

    /// Open a handle on the root stored under `cid`
    pub async fn load(
        cid: &Cid,
        store: Arc<S>,
        pinner: Arc<dyn Pinner>,
        splitter: Arc<dyn BlockSplitter>,
    ) -> Result<Self> {
        let root: DagNode = store.get_ipld(cid).await?;
        unixfs::decode(&root)?;
        Ok(Self::new(&root, store, pinner, splitter))
    }

    /// Replace the tunables
    pub fn with_config(mut self, config: ModifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Emit this handle's diagnostics under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Current tunables
    pub fn config(&self) -> &ModifierConfig {
        &self.config
    }

    /// Current cursor, without flushing
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Whether written bytes are still waiting in the buffer
    pub fn has_pending_changes(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Write `data` at `offset`.
    ///
    /// A write at the cursor only extends the buffer. Any other offset flushes
    /// first and grows the file with zeros if `offset` is past the end.
    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        if offset != self.cursor {
            let size = self.size().await?;
            if offset > size {
                self.expand_sparse(offset - size).await?;
            }
            self.flush().await?;
            self.write_start = offset;
            self.cursor = offset;
        }
        self.write(data).await
    }

    /// Write `data` at the cursor
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.reader = None;
        if self.buffer.is_empty() {
            self.write_start = self.cursor;
        }

        self.buffer.extend_from_slice(data);
        self.cursor += data.len() as u64;
        trace!(parent: &self.span, len = data.len(), buffered = self.buffer.len(), "buffered write");

        if self.buffer.len() > self.config.write_buffer_size {
            self.flush().await?;
        }
        Ok(data.len())
    }

    /// Materialize buffered writes into the tree.
    ///
    /// Does nothing when the buffer is empty. On failure the buffer is kept.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.reader = None;

        let size = unixfs::decode(&self.root)?.file_size();
        if self.write_start > size {
            self.expand_sparse(self.write_start - size).await?;
        }

        let buffered = self.buffer.len();
        let mut data = Bytes::copy_from_slice(&self.buffer);
        let rewritten =
            editor::overwrite(self.store.as_ref(), self.root.clone(), self.write_start, &mut data)
                .await?;

        let mut root = rewritten.node;
        if !rewritten.consumed && !data.is_empty() {
            let appended = data.len();
            let blocks = self.splitter.split(Box::new(Cursor::new(data)));
            root = self.appender().append(root, blocks).await?;
            self.store.put_ipld(&root).await?;
            debug!(parent: &self.span, appended, "appended past end of file");
        }

        self.root = root;
        self.write_start += buffered as u64;
        self.buffer.clear();
        debug!(parent: &self.span, bytes = buffered, write_start = self.write_start, "flushed");
        Ok(())
    }

    /// File size including buffered writes (flushes)
    pub async fn size(&mut self) -> Result<u64> {
        self.flush().await?;
        Ok(unixfs::decode(&self.root)?.file_size())
    }

    /// Read from the cursor into `buf`. Returns 0 at EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.flush().await?;

        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => self.open_reader()?,
        };
        let reader = self.reader.insert(reader);

        let n = reader.read(buf).await?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn open_reader(&self) -> Result<DagReader<S>> {
        let mut reader = DagReader::new(self.store.clone(), &self.root)?;
        let actual = reader.seek(SeekFrom::Start(self.cursor))?;
        if actual != self.cursor {
            return Err(CoreError::SeekFailed {
                expected: self.cursor,
                actual,
            });
        }
        Ok(reader)
    }

    /// Move the cursor for both reads and writes (flushes).
    ///
    /// Seeking past the end is allowed; a following write grows the file with
    /// zeros, a following read fails with [`CoreError::SeekFailed`].
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.flush().await?;

        let target = match whence {
            Whence::Start => i128::from(offset),
            Whence::Current => i128::from(self.cursor) + i128::from(offset),
            Whence::End => return Err(CoreError::SeekEndNotImplemented),
        };
        if target < 0 {
            return Err(CoreError::InvalidOffset(
                i64::try_from(target).unwrap_or(i64::MIN),
            ));
        }
        let target = u64::try_from(target).unwrap_or(u64::MAX);

        self.cursor = target;
        self.write_start = target;
        if let Some(reader) = self.reader.as_mut() {
            if reader.seek(SeekFrom::Start(target))? != target {
                self.reader = None;
            }
        }
        Ok(target)
    }

    /// Shrink the file to `size` bytes, or grow it with zeros (flushes)
    pub async fn truncate(&mut self, size: u64) -> Result<()> {
        let current = self.size().await?;
        if size > current {
            return self.expand_sparse(size - current).await;
        }

        let root = if size == 0 {
            unixfs::empty_file()?
        } else {
            truncate::prune(self.store.as_ref(), self.root.clone(), size).await?
        };
        self.store.put_ipld(&root).await?;

        self.root = root;
        self.reader = None;
        debug!(parent: &self.span, from = current, to = size, "truncated");
        Ok(())
    }

    /// A copy of the current root (flushes)
    pub async fn get_root(&mut self) -> Result<DagNode> {
        self.flush().await?;
        Ok(self.root.clone())
    }

    /// CID of the current root, stored if it was not already (flushes)
    pub async fn get_root_cid(&mut self) -> Result<Cid> {
        self.flush().await?;
        Ok(self.store.put_ipld(&self.root).await?)
    }

    fn appender(&self) -> TreeAppender<S> {
        TreeAppender::new(self.store.clone(), self.pinner.clone())
            .with_max_links(self.config.max_links)
    }

    /// Grow the file by `by` zero bytes in small leaves that dedup across files
    async fn expand_sparse(&mut self, by: u64) -> Result<()> {
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(
            self.config.sparse_chunk_size,
        )?);
        let zeros = std::io::repeat(0).take(by);
        let root = self
            .appender()
            .append(self.root.clone(), chunker.split(Box::new(zeros)))
            .await?;
        self.store.put_ipld(&root).await?;

        self.root = root;
        self.reader = None;
        debug!(parent: &self.span, by, "expanded with zeros");
        Ok(())
    }
}
