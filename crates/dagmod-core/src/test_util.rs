//! Helpers shared by unit tests

use crate::unixfs::{self, DataType, FsNode};
use crate::DagReader;
use dagmod_blockstore::{BlockStore, DagLink, DagNode};
use std::sync::Arc;

/// One-level file over `leaf_size` leaves. Leaves are stored, the root is not.
pub(crate) async fn build_file<S: BlockStore>(store: &S, bytes: &[u8], leaf_size: usize) -> DagNode {
    let mut root = unixfs::empty_internal().unwrap();
    let mut meta = FsNode::new(DataType::File);
    for chunk in bytes.chunks(leaf_size) {
        let cid = store.put_ipld(&unixfs::leaf_node(chunk).unwrap()).await.unwrap();
        unixfs::push_child(&mut root, &mut meta, DagLink::unnamed(cid, chunk.len() as u64));
    }
    root.data = meta.to_bytes().unwrap();
    root
}

/// Full contents of the file rooted at `node`
pub(crate) async fn read_all<S: BlockStore + Clone>(store: &S, node: &DagNode) -> Vec<u8> {
    let mut reader = DagReader::new(Arc::new(store.clone()), node).unwrap();
    reader.read_to_end().await.unwrap()
}
