//! Streaming reads over a DAG file

use crate::unixfs;
use crate::{CoreError, Result};
use bytes::Bytes;
use dagmod_blockstore::{BlockStore, DagNode};
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::trace;

/// Sequential reader over the file rooted at a node.
///
/// Leaves are located by walking block sizes from the root, so seeking never
/// fetches more than one path. The most recent leaf is kept for sequential
/// reads.
pub struct DagReader<S: BlockStore> {
    store: Arc<S>,
    root: DagNode,
    size: u64,
    offset: u64,
    /// File offset of the cached leaf and its payload
    leaf: Option<(u64, Bytes)>,
}

impl<S: BlockStore> DagReader<S> {
    /// Create a reader positioned at the start of `root`
    pub fn new(store: Arc<S>, root: &DagNode) -> Result<Self> {
        let size = unixfs::decode(root)?.file_size();
        Ok(Self {
            store,
            root: root.clone(),
            size,
            offset: 0,
            leaf: None,
        })
    }

    /// Total size of the file
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Read into `buf`, crossing leaf boundaries as needed. Returns 0 at EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() && self.offset < self.size {
            let (start, payload) = self.leaf_at(self.offset).await?;
            let within = (self.offset - start) as usize;
            if within >= payload.len() {
                return Err(CoreError::TreeCorruption(format!(
                    "leaf at {} ends before offset {}",
                    start, self.offset
                )));
            }

            let take = (buf.len() - n).min(payload.len() - within);
            buf[n..n + take].copy_from_slice(&payload[within..within + take]);
            n += take;
            self.offset += take as u64;
        }
        Ok(n)
    }

    /// Move the read position. The result is clamped to the file size.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
        };
        if target < 0 {
            return Err(CoreError::InvalidOffset(
                i64::try_from(target).unwrap_or(i64::MIN),
            ));
        }

        self.offset = u64::try_from(target).unwrap_or(u64::MAX).min(self.size);
        Ok(self.offset)
    }

    /// Read everything from the current position to the end
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let remaining = usize::try_from(self.size - self.offset)
            .map_err(|_| CoreError::InvalidOffset(i64::try_from(self.size).unwrap_or(i64::MAX)))?;
        let mut out = vec![0u8; remaining];
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read(&mut out[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(out)
    }

    async fn leaf_at(&mut self, offset: u64) -> Result<(u64, Bytes)> {
        if let Some((start, payload)) = &self.leaf {
            if *start <= offset && offset < *start + payload.len() as u64 {
                return Ok((*start, payload.clone()));
            }
        }

        let located = self.locate(offset).await?;
        self.leaf = Some(located.clone());
        Ok(located)
    }

    /// Walk down from the root to the leaf holding `offset`
    async fn locate(&self, offset: u64) -> Result<(u64, Bytes)> {
        let mut node = self.root.clone();
        let mut base = 0u64;
        loop {
            let meta = unixfs::decode(&node)?;
            if node.is_leaf() {
                trace!(offset, start = base, len = meta.data.len(), "located leaf");
                return Ok((base, Bytes::from(meta.data)));
            }

            let mut cur = base;
            let mut next = None;
            for (i, &size) in meta.blocksizes.iter().enumerate() {
                if offset < cur + size {
                    next = Some(i);
                    break;
                }
                cur += size;
            }
            let Some(i) = next else {
                return Err(CoreError::TreeCorruption(format!(
                    "offset {} is past the end of a subtree",
                    offset
                )));
            };

            base = cur;
            let child = node.links[i].cid;
            node = self.store.get_ipld(&child).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::build_file;
    use dagmod_blockstore::MemoryBlockStore;

    async fn reader(data: &[u8], leaf_size: usize) -> DagReader<MemoryBlockStore> {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, data, leaf_size).await;
        DagReader::new(Arc::new(store), &root).unwrap()
    }

    #[tokio::test]
    async fn test_read_across_leaves() {
        let mut r = reader(b"aaaabbbbcc", 4).await;
        let mut buf = [0u8; 6];

        assert_eq!(r.read(&mut buf).await.unwrap(), 6);
        assert_eq!(&buf, b"aaaabb");
        assert_eq!(r.position(), 6);

        assert_eq!(r.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], b"bbcc");
        assert_eq!(r.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seek_then_read() {
        let mut r = reader(b"0123456789", 3).await;

        assert_eq!(r.seek(SeekFrom::Start(7)).unwrap(), 7);
        assert_eq!(r.read_to_end().await.unwrap(), b"789");

        assert_eq!(r.seek(SeekFrom::Current(-5)).unwrap(), 5);
        assert_eq!(r.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(r.read_to_end().await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn test_read_to_end_reads_only_the_rest() {
        let mut r = reader(b"abcdefgh", 3).await;

        r.seek(SeekFrom::Start(5)).unwrap();
        assert_eq!(r.read_to_end().await.unwrap(), b"fgh");
        assert_eq!(r.position(), 8);
        assert!(r.read_to_end().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seek_is_clamped() {
        let mut r = reader(b"abc", 2).await;

        assert_eq!(r.seek(SeekFrom::Start(100)).unwrap(), 3);
        assert_eq!(r.seek(SeekFrom::End(5)).unwrap(), 3);

        let err = r.seek(SeekFrom::Current(-4)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOffset(-1)));
        assert_eq!(r.position(), 3);
    }

    #[tokio::test]
    async fn test_read_single_leaf_root() {
        let root = unixfs::leaf_node(b"just a leaf").unwrap();
        let mut r = DagReader::new(Arc::new(MemoryBlockStore::new()), &root).unwrap();

        assert_eq!(r.size(), 11);
        assert_eq!(r.read_to_end().await.unwrap(), b"just a leaf");
    }

    #[tokio::test]
    async fn test_read_empty_file() {
        let root = unixfs::empty_file().unwrap();
        let mut r = DagReader::new(Arc::new(MemoryBlockStore::new()), &root).unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(r.read(&mut buf).await.unwrap(), 0);
        assert!(r.read_to_end().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_child_surfaces_store_error() {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, b"aaaabbbb", 4).await;
        store.delete_block(&root.links[1].cid).await.unwrap();

        let mut r = DagReader::new(Arc::new(store), &root).unwrap();
        let err = r.read_to_end().await.unwrap_err();
        assert!(matches!(err, CoreError::BlockStore(_)));
    }
}
