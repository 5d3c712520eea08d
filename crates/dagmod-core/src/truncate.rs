//! Shrinking a DAG file

use crate::unixfs::{self, FsNode};
use crate::{CoreError, Result};
use dagmod_blockstore::{BlockStore, DagLink, DagNode};
use futures::future::BoxFuture;
use tracing::trace;

/// Cut the file rooted at `node` down to its first `size` bytes.
///
/// Children entirely before the cut are kept by reference, the child holding
/// the cut is pruned recursively and children after it are dropped. A cut that
/// lands exactly on a child boundary keeps that child whole. The returned root
/// is not stored; rebuilt descendants are.
pub fn prune<'a, S: BlockStore>(
    store: &'a S,
    node: DagNode,
    size: u64,
) -> BoxFuture<'a, Result<DagNode>> {
    Box::pin(async move {
        let meta = unixfs::decode(&node)?;

        if node.is_leaf() {
            let keep = usize::try_from(size)
                .unwrap_or(usize::MAX)
                .min(meta.data.len());
            return unixfs::leaf_node(&meta.data[..keep]);
        }

        let mut cur = 0u64;
        for (i, &child_size) in meta.blocksizes.iter().enumerate() {
            if size <= cur + child_size {
                let link = &node.links[i];
                let child: DagNode = store.get_ipld(&link.cid).await?;
                let pruned = prune(store, child, size - cur).await?;
                let cid = store.put_ipld(&pruned).await?;
                trace!(child = i, keep = size - cur, "pruned child");

                let mut out = unixfs::empty_internal()?;
                let mut out_meta = FsNode::new(meta.data_type);
                for kept in &node.links[..i] {
                    unixfs::push_child(&mut out, &mut out_meta, kept.clone());
                }
                unixfs::push_child(
                    &mut out,
                    &mut out_meta,
                    DagLink::new(link.name.clone(), cid, size - cur),
                );
                out.data = out_meta.to_bytes()?;
                return Ok(out);
            }
            cur += child_size;
        }

        Err(CoreError::TreeCorruption(format!(
            "cannot truncate to {} bytes, tree holds {}",
            size, cur
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{build_file, read_all};
    use dagmod_blockstore::MemoryBlockStore;

    #[tokio::test]
    async fn test_prune_leaf() {
        let store = MemoryBlockStore::new();
        let root = unixfs::leaf_node(b"0123456789").unwrap();

        let out = prune(&store, root, 4).await.unwrap();
        assert!(out.is_leaf());
        assert_eq!(read_all(&store, &out).await, b"0123");
    }

    #[tokio::test]
    async fn test_prune_mid_child() {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, b"aaaabbbbcccc", 4).await;

        let out = prune(&store, root.clone(), 6).await.unwrap();
        let meta = unixfs::decode(&out).unwrap();

        assert_eq!(meta.blocksizes, vec![4, 2]);
        assert_eq!(out.links[0], root.links[0]);
        assert_eq!(read_all(&store, &out).await, b"aaaabb");
    }

    #[tokio::test]
    async fn test_prune_on_boundary_keeps_child_whole() {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, b"aaaabbbbcccc", 4).await;

        let out = prune(&store, root.clone(), 8).await.unwrap();

        assert_eq!(out.links.len(), 2);
        assert_eq!(out.links[1], root.links[1]);
        assert_eq!(read_all(&store, &out).await, b"aaaabbbb");
    }

    #[tokio::test]
    async fn test_prune_to_full_size_is_identity() {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, b"aaaabbbb", 4).await;

        let out = prune(&store, root.clone(), 8).await.unwrap();
        assert_eq!(out, root);
    }

    #[tokio::test]
    async fn test_prune_beyond_size_fails() {
        let store = MemoryBlockStore::new();
        let root = build_file(&store, b"aaaabbbb", 4).await;

        let err = prune(&store, root, 9).await.unwrap_err();
        assert!(matches!(err, CoreError::TreeCorruption(_)));
    }
}
