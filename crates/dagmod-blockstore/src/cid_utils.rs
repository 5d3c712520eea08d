//! CID (Content Identifier) utilities
//!
//! Creates content-addressed identifiers using BLAKE3

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

/// Supported IPLD codecs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CidCodec {
    /// Raw binary data (0x55)
    #[default]
    Raw,
    /// DAG-CBOR (0x71)
    DagCbor,
}

impl CidCodec {
    /// Get the multicodec code
    pub fn code(&self) -> u64 {
        match self {
            CidCodec::Raw => 0x55,
            CidCodec::DagCbor => 0x71,
        }
    }

    /// Parse from multicodec code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(CidCodec::Raw),
            0x71 => Some(CidCodec::DagCbor),
            _ => None,
        }
    }
}

/// Create a CIDv1 from data using a BLAKE3-256 multihash
pub fn create_cid(data: &[u8], codec: CidCodec) -> Cid {
    Cid::new_v1(codec.code(), Code::Blake3_256.digest(data))
}

/// Verify that data matches a CID
pub fn verify_cid(data: &[u8], cid: &Cid) -> bool {
    match CidCodec::from_code(cid.codec()) {
        Some(codec) => create_cid(data, codec) == *cid,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cid::Version;

    #[test]
    fn test_create_cid() {
        let data = b"Hello, World!";
        let cid = create_cid(data, CidCodec::Raw);

        assert_eq!(cid.version(), Version::V1);
        assert_eq!(cid.codec(), CidCodec::Raw.code());
        assert_eq!(cid.hash().code(), 0x1e); // blake3-256
    }

    #[test]
    fn test_cid_consistency() {
        let data = b"test data";
        let cid1 = create_cid(data, CidCodec::Raw);
        let cid2 = create_cid(data, CidCodec::Raw);

        assert_eq!(cid1, cid2);
    }

    #[test]
    fn test_codec_changes_cid() {
        let raw = create_cid(b"same bytes", CidCodec::Raw);
        let cbor = create_cid(b"same bytes", CidCodec::DagCbor);

        assert_ne!(raw, cbor);
        assert_eq!(raw.hash(), cbor.hash());
    }

    #[test]
    fn test_verify_cid() {
        let data = b"verify me";
        let cid = create_cid(data, CidCodec::DagCbor);

        assert!(verify_cid(data, &cid));
        assert!(!verify_cid(b"wrong data", &cid));
    }

    #[test]
    fn test_codec_from_code() {
        assert_eq!(CidCodec::from_code(0x71), Some(CidCodec::DagCbor));
        assert_eq!(CidCodec::from_code(0x55), Some(CidCodec::Raw));
        assert_eq!(CidCodec::from_code(0x70), None);
    }
}
