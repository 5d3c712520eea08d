//! DAG node types

use cid::Cid;
use serde::{Deserialize, Serialize};

/// Helper for serializing CIDs
mod cid_serde {
    use cid::Cid;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(cid: &Cid, s: S) -> Result<S::Ok, S::Error> {
        cid.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Cid, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A link in a DAG structure
///
/// Link order is meaningful: it is the byte order of the file the DAG encodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagLink {
    /// The name of the link (empty for file chunks)
    pub name: String,
    /// The CID being linked to
    #[serde(with = "cid_serde")]
    pub cid: Cid,
    /// File bytes represented by the linked subtree
    pub size: u64,
}

impl DagLink {
    /// Create a new DAG link
    pub fn new(name: impl Into<String>, cid: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
        }
    }

    /// Create an unnamed link, as used between file chunks
    pub fn unnamed(cid: Cid, size: u64) -> Self {
        Self::new(String::new(), cid, size)
    }
}

/// A DAG node with links
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    /// The data in this node
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Links to other nodes
    pub links: Vec<DagLink>,
}

impl DagNode {
    /// Create an empty DAG node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with data
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data,
            links: Vec::new(),
        }
    }

    /// Add a link
    pub fn add_link(&mut self, link: DagLink) {
        self.links.push(link);
    }

    /// A node without links
    pub fn is_leaf(&self) -> bool {
        self.links.is_empty()
    }

    /// Content identifier this node is stored under by `BlockStore::put_ipld`
    pub fn cid(&self) -> crate::Result<Cid> {
        let bytes = serde_ipld_dagcbor::to_vec(self)
            .map_err(|e| crate::BlockStoreError::Serialization(e.to_string()))?;
        Ok(crate::cid_utils::create_cid(
            &bytes,
            crate::cid_utils::CidCodec::DagCbor,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid_utils::{create_cid, CidCodec};

    #[test]
    fn test_dag_node_links() {
        let mut node = DagNode::with_data(b"root data".to_vec());
        assert!(node.is_leaf());

        node.add_link(DagLink::unnamed(create_cid(b"child data", CidCodec::Raw), 10));
        node.add_link(DagLink::unnamed(create_cid(b"more", CidCodec::Raw), 4));

        assert!(!node.is_leaf());
        assert_eq!(node.links.iter().map(|l| l.size).collect::<Vec<_>>(), vec![10, 4]);
    }

    #[test]
    fn test_dag_node_cbor_roundtrip() {
        let child = create_cid(b"leaf", CidCodec::Raw);
        let mut node = DagNode::with_data(vec![1, 2, 3]);
        node.add_link(DagLink::new("c", child, 4));

        let bytes = serde_ipld_dagcbor::to_vec(&node).unwrap();
        let decoded: DagNode = serde_ipld_dagcbor::from_slice(&bytes).unwrap();
        assert_eq!(node, decoded);
        assert_eq!(node.cid().unwrap(), decoded.cid().unwrap());
    }
}
