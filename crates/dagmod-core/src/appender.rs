//! Appending new leaves to the end of a DAG file
//!
//! New blocks fill the rightmost path of the tree first. Once every node on
//! that path holds `max_links` children the root is pushed down one level under
//! a fresh root, so the tree stays shallow and earlier subtrees are shared
//! unchanged between versions.

use crate::unixfs::{self, FsNode};
use crate::Result;
use dagmod_blockstore::{BlockStore, Blocks, DagLink, DagNode, PinMode, Pinner};
use futures::future::BoxFuture;
use std::iter::Peekable;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default max links per internal node (fanout)
pub const DEFAULT_MAX_LINKS: usize = 174;

type BlockIter<'b> = Peekable<Blocks<'b>>;

/// Extends DAG files with new leaves under a fan-out limit
pub struct TreeAppender<S: BlockStore> {
    store: Arc<S>,
    pinner: Arc<dyn Pinner>,
    max_links: usize,
}

impl<S: BlockStore> TreeAppender<S> {
    /// Create an appender with the default fan-out
    pub fn new(store: Arc<S>, pinner: Arc<dyn Pinner>) -> Self {
        Self {
            store,
            pinner,
            max_links: DEFAULT_MAX_LINKS,
        }
    }

    /// Override the fan-out (at least 2)
    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links.max(2);
        self
    }

    /// Append `blocks` after the last byte of `base` and return the new root.
    ///
    /// The returned root is not stored; every node below it is stored and
    /// pinned indirectly.
    #[instrument(skip(self, base, blocks))]
    pub async fn append(&self, base: DagNode, blocks: Blocks<'_>) -> Result<DagNode> {
        let mut blocks = blocks.peekable();
        let base_meta = unixfs::decode(&base)?;

        let (mut root, mut depth) = if !base.is_leaf() {
            let depth = self.depth(&base).await?;
            (base, depth)
        } else if base_meta.file_size() == 0 {
            (unixfs::empty_internal()?, 1)
        } else {
            let size = base_meta.file_size();
            let cid = self.store_node(&base).await?;
            (self.wrap(DagLink::unnamed(cid, size))?, 1)
        };

        loop {
            root = self.fill(root, depth, &mut blocks).await?;
            if blocks.peek().is_none() {
                break;
            }

            // Root is full on every level; push it down
            let size = unixfs::decode(&root)?.file_size();
            let cid = self.store_node(&root).await?;
            root = self.wrap(DagLink::unnamed(cid, size))?;
            depth += 1;
            debug!(depth, "grew tree");
        }

        while root.links.len() == 1 {
            let only = root.links[0].cid;
            root = self.store.get_ipld(&only).await?;
        }
        Ok(root)
    }

    /// Levels below `node` along its rightmost path
    async fn depth(&self, node: &DagNode) -> Result<usize> {
        let mut depth = 0;
        let mut current = node.clone();
        while let Some(last) = current.links.last() {
            let cid = last.cid;
            current = self.store.get_ipld(&cid).await?;
            depth += 1;
        }
        Ok(depth)
    }

    fn wrap(&self, link: DagLink) -> Result<DagNode> {
        let mut node = unixfs::empty_internal()?;
        let mut meta = FsNode::new(unixfs::DataType::File);
        unixfs::push_child(&mut node, &mut meta, link);
        node.data = meta.to_bytes()?;
        Ok(node)
    }

    async fn store_node(&self, node: &DagNode) -> Result<cid::Cid> {
        let cid = self.store.put_ipld(node).await?;
        self.pinner.pin(&cid, PinMode::Indirect).await?;
        Ok(cid)
    }

    /// Add children to `node`, whose leaves sit `depth` levels below it, until
    /// it is full or `blocks` runs dry.
    fn fill<'a, 'b: 'a>(
        &'a self,
        mut node: DagNode,
        depth: usize,
        blocks: &'a mut BlockIter<'b>,
    ) -> BoxFuture<'a, Result<DagNode>> {
        Box::pin(async move {
            let mut meta = unixfs::decode(&node)?;

            if depth <= 1 {
                while node.links.len() < self.max_links {
                    let Some(block) = blocks.next() else { break };
                    let block = block?;
                    if block.is_empty() {
                        continue;
                    }
                    let cid = self.store_node(&unixfs::leaf_node(&block)?).await?;
                    unixfs::push_child(&mut node, &mut meta, DagLink::unnamed(cid, block.len() as u64));
                }
                node.data = meta.to_bytes()?;
                return Ok(node);
            }

            // Top up the rightmost subtree before opening new ones
            if blocks.peek().is_some() {
                if let Some(last) = node.links.last().cloned() {
                    let child: DagNode = self.store.get_ipld(&last.cid).await?;
                    if !child.is_leaf() {
                        let child = self.fill(child, depth - 1, &mut *blocks).await?;
                        let size = unixfs::decode(&child)?.file_size();
                        let cid = self.store_node(&child).await?;
                        let index = node.links.len() - 1;
                        node.links[index] = DagLink::new(last.name, cid, size);
                        meta.set_block_size(index, size);
                    }
                }
            }

            while node.links.len() < self.max_links && blocks.peek().is_some() {
                let child = self
                    .fill(unixfs::empty_internal()?, depth - 1, &mut *blocks)
                    .await?;
                if child.is_leaf() {
                    // Only empty blocks were left
                    break;
                }
                let size = unixfs::decode(&child)?.file_size();
                let cid = self.store_node(&child).await?;
                unixfs::push_child(&mut node, &mut meta, DagLink::unnamed(cid, size));
            }

            node.data = meta.to_bytes()?;
            Ok(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::read_all;
    use bytes::Bytes;
    use dagmod_blockstore::{BlockSplitter, Chunker, ChunkerConfig, MemoryBlockStore, MemoryPinner};
    use std::io::Cursor;

    fn blocks(data: &[u8], chunk: usize) -> Blocks<'static> {
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(chunk).unwrap());
        chunker.split(Box::new(Cursor::new(data.to_vec())))
    }

    fn appender(store: &Arc<MemoryBlockStore>, pinner: &Arc<MemoryPinner>) -> TreeAppender<MemoryBlockStore> {
        TreeAppender::new(store.clone(), pinner.clone()).with_max_links(3)
    }

    /// Widest node anywhere in the tree
    fn max_fanout<'a>(
        store: &'a MemoryBlockStore,
        node: &'a DagNode,
    ) -> BoxFuture<'a, usize> {
        Box::pin(async move {
            let mut widest = node.links.len();
            for link in &node.links {
                let child: DagNode = store.get_ipld(&link.cid).await.unwrap();
                widest = widest.max(max_fanout(store, &child).await);
            }
            widest
        })
    }

    #[tokio::test]
    async fn test_append_to_empty_single_block_is_leaf() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());

        let root = appender(&store, &pinner)
            .append(unixfs::empty_file().unwrap(), blocks(b"abc", 4))
            .await
            .unwrap();

        assert!(root.is_leaf());
        assert_eq!(read_all(store.as_ref(), &root).await, b"abc");
    }

    #[tokio::test]
    async fn test_append_respects_fanout() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());
        let data: Vec<u8> = (0..40u8).collect();

        // 20 leaves with fanout 3 needs three levels of internal nodes
        let root = appender(&store, &pinner)
            .append(unixfs::empty_file().unwrap(), blocks(&data, 2))
            .await
            .unwrap();

        assert_eq!(unixfs::decode(&root).unwrap().file_size(), 40);
        assert!(max_fanout(store.as_ref(), &root).await <= 3);
        assert_eq!(read_all(store.as_ref(), &root).await, data);
    }

    #[tokio::test]
    async fn test_append_to_existing_leaf() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());
        let base = unixfs::leaf_node(b"head-").unwrap();

        let root = appender(&store, &pinner)
            .append(base, blocks(b"tail", 2))
            .await
            .unwrap();

        assert_eq!(read_all(store.as_ref(), &root).await, b"head-tail");
        assert_eq!(
            unixfs::decode(&root).unwrap().blocksizes,
            vec![5, 2, 2]
        );
    }

    #[tokio::test]
    async fn test_repeated_appends_match_single_append() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());
        let data: Vec<u8> = (0..30u8).collect();
        let app = appender(&store, &pinner);

        let mut root = unixfs::empty_file().unwrap();
        for piece in data.chunks(6) {
            root = app.append(root, blocks(piece, 2)).await.unwrap();
        }
        let at_once = app
            .append(unixfs::empty_file().unwrap(), blocks(&data, 2))
            .await
            .unwrap();

        assert_eq!(read_all(store.as_ref(), &root).await, data);
        assert_eq!(root, at_once);
    }

    #[tokio::test]
    async fn test_append_nothing_keeps_base() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());
        let base = unixfs::leaf_node(b"solo").unwrap();

        let root = appender(&store, &pinner)
            .append(base.clone(), Box::new(std::iter::empty::<dagmod_blockstore::Result<Bytes>>()))
            .await
            .unwrap();

        assert_eq!(root, base);
    }

    #[tokio::test]
    async fn test_appended_nodes_are_pinned() {
        let store = Arc::new(MemoryBlockStore::new());
        let pinner = Arc::new(MemoryPinner::new());

        let root = appender(&store, &pinner)
            .append(unixfs::empty_file().unwrap(), blocks(b"abcdefgh", 2))
            .await
            .unwrap();

        for link in &root.links {
            assert_eq!(pinner.mode(&link.cid), Some(PinMode::Indirect));
        }
        assert!(!pinner.is_empty());
    }
}
