//! File metadata codec
//!
//! Every node of a DAG file carries an [`FsNode`] in its `data` field, encoded
//! as DAG-CBOR. Leaves hold the raw file bytes; internal nodes hold the size of
//! each child subtree in link order, which is what lets the editor, the pruner
//! and the reader map a byte offset to a child without fetching its siblings.

use crate::{CoreError, Result};
use dagmod_blockstore::{DagLink, DagNode};
use serde::{Deserialize, Serialize};

/// Kind of file node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Leaf holding raw file bytes
    Raw,
    /// File root or internal node
    File,
}

/// Decoded file metadata of a single node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsNode {
    /// Node kind
    pub data_type: DataType,
    /// Payload bytes (leaves only)
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Total file bytes represented by this subtree
    pub filesize: u64,
    /// File bytes of each child subtree, in link order
    pub blocksizes: Vec<u64>,
}

impl FsNode {
    /// Empty metadata of the given kind
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            data: Vec::new(),
            filesize: 0,
            blocksizes: Vec::new(),
        }
    }

    /// Leaf metadata wrapping `payload`
    pub fn raw(payload: Vec<u8>) -> Self {
        Self {
            data_type: DataType::Raw,
            filesize: payload.len() as u64,
            data: payload,
            blocksizes: Vec::new(),
        }
    }

    /// Decode from a node's data field
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let node: Self = serde_ipld_dagcbor::from_slice(bytes)
            .map_err(|e| CoreError::Deserialization(e.to_string()))?;

        let expected = node
            .blocksizes
            .iter()
            .try_fold(node.data.len() as u64, |total, &size| total.checked_add(size))
            .ok_or_else(|| CoreError::TreeCorruption("block sizes overflow".to_string()))?;
        if node.filesize != expected {
            return Err(CoreError::TreeCorruption(format!(
                "filesize {} does not match payload and children ({})",
                node.filesize, expected
            )));
        }
        Ok(node)
    }

    /// Encode for a node's data field
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Aggregate size of the subtree
    pub fn file_size(&self) -> u64 {
        self.filesize
    }

    /// Record a new trailing child of `size` bytes
    pub fn add_block_size(&mut self, size: u64) {
        self.blocksizes.push(size);
        self.filesize += size;
    }

    /// Change the recorded size of child `index`
    pub fn set_block_size(&mut self, index: usize, size: u64) {
        let old = std::mem::replace(&mut self.blocksizes[index], size);
        self.filesize = self.filesize - old + size;
    }

    /// Number of children recorded
    pub fn num_children(&self) -> usize {
        self.blocksizes.len()
    }
}

/// Decode the metadata of `node` and check it against the node's links
pub fn decode(node: &DagNode) -> Result<FsNode> {
    let meta = FsNode::from_bytes(&node.data)?;
    if meta.num_children() != node.links.len() {
        return Err(CoreError::TreeCorruption(format!(
            "{} links but {} block sizes",
            node.links.len(),
            meta.num_children()
        )));
    }
    if let Some((link, size)) = node
        .links
        .iter()
        .zip(&meta.blocksizes)
        .find(|(link, size)| link.size != **size)
    {
        return Err(CoreError::TreeCorruption(format!(
            "link {} records {} bytes, metadata records {}",
            link.cid, link.size, size
        )));
    }
    Ok(meta)
}

/// Aggregate size encoded in a node's data field
pub fn data_size(bytes: &[u8]) -> Result<u64> {
    Ok(FsNode::from_bytes(bytes)?.file_size())
}

/// A leaf node holding `payload`
pub fn leaf_node(payload: &[u8]) -> Result<DagNode> {
    Ok(DagNode::with_data(FsNode::raw(payload.to_vec()).to_bytes()?))
}

/// An internal node with no children yet
pub fn empty_internal() -> Result<DagNode> {
    Ok(DagNode::with_data(FsNode::new(DataType::File).to_bytes()?))
}

/// The root of a zero-length file
pub fn empty_file() -> Result<DagNode> {
    empty_internal()
}

/// Append a child of `size` file bytes to an internal node
pub fn push_child(node: &mut DagNode, meta: &mut FsNode, link: DagLink) {
    meta.add_block_size(link.size);
    node.add_link(link);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagmod_blockstore::cid_utils::{create_cid, CidCodec};

    #[test]
    fn test_leaf_roundtrip() {
        let node = leaf_node(b"hello").unwrap();
        let meta = decode(&node).unwrap();

        assert!(node.is_leaf());
        assert_eq!(meta.data_type, DataType::Raw);
        assert_eq!(meta.data, b"hello");
        assert_eq!(meta.file_size(), 5);
        assert_eq!(data_size(&node.data).unwrap(), 5);
    }

    #[test]
    fn test_empty_file() {
        let node = empty_file().unwrap();
        let meta = decode(&node).unwrap();

        assert!(node.is_leaf());
        assert_eq!(meta.data_type, DataType::File);
        assert_eq!(meta.file_size(), 0);
    }

    #[test]
    fn test_block_sizes_track_filesize() {
        let mut node = empty_internal().unwrap();
        let mut meta = FsNode::new(DataType::File);
        let a = create_cid(b"a", CidCodec::DagCbor);
        let b = create_cid(b"b", CidCodec::DagCbor);

        push_child(&mut node, &mut meta, DagLink::unnamed(a, 10));
        push_child(&mut node, &mut meta, DagLink::unnamed(b, 6));
        assert_eq!(meta.file_size(), 16);

        meta.set_block_size(1, 2);
        assert_eq!(meta.file_size(), 12);
        assert_eq!(meta.blocksizes, vec![10, 2]);

        node.data = meta.to_bytes().unwrap();
        assert_eq!(decode(&node).unwrap(), meta);
    }

    #[test]
    fn test_decode_rejects_link_mismatch() {
        let mut node = leaf_node(b"xy").unwrap();
        node.add_link(DagLink::unnamed(create_cid(b"c", CidCodec::Raw), 1));

        assert!(matches!(decode(&node), Err(CoreError::TreeCorruption(_))));
    }

    #[test]
    fn test_decode_rejects_size_mismatch() {
        let mut node = empty_internal().unwrap();
        let mut meta = FsNode::new(DataType::File);
        push_child(
            &mut node,
            &mut meta,
            DagLink::unnamed(create_cid(b"c", CidCodec::Raw), 4),
        );
        node.links[0].size = 5;
        node.data = meta.to_bytes().unwrap();

        assert!(matches!(decode(&node), Err(CoreError::TreeCorruption(_))));
    }

    #[test]
    fn test_decode_rejects_bad_filesize() {
        let mut meta = FsNode::raw(b"abc".to_vec());
        meta.filesize = 7;
        let bytes = serde_ipld_dagcbor::to_vec(&meta).unwrap();

        assert!(matches!(
            FsNode::from_bytes(&bytes),
            Err(CoreError::TreeCorruption(_))
        ));
    }

    #[test]
    fn test_decode_rejects_overflowing_block_sizes() {
        let meta = FsNode {
            data_type: DataType::File,
            data: Vec::new(),
            filesize: 1,
            blocksizes: vec![u64::MAX, 2],
        };
        let bytes = serde_ipld_dagcbor::to_vec(&meta).unwrap();

        assert!(matches!(
            FsNode::from_bytes(&bytes),
            Err(CoreError::TreeCorruption(_))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            FsNode::from_bytes(b"\xff\x00 not cbor"),
            Err(CoreError::Deserialization(_))
        ));
    }
}
