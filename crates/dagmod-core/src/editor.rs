//! Recursive in-place overwrite of a DAG file
//!
//! The editor never changes the shape of the tree: leaves keep their length and
//! internal nodes keep their block sizes. Bytes that do not fit inside the
//! existing file are left in `data` for the appender.

use crate::unixfs;
use crate::Result;
use bytes::{Buf, Bytes};
use cid::Cid;
use dagmod_blockstore::{BlockStore, DagNode};
use futures::future::BoxFuture;
use tracing::{instrument, trace};

/// Outcome of rewriting a subtree
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// CID the rewritten subtree root was stored under
    pub cid: Cid,
    /// The rewritten subtree root
    pub node: DagNode,
    /// Whether every input byte found room in the existing leaves
    pub consumed: bool,
}

/// Overwrite the bytes of `node` starting at `offset` with the front of `data`.
///
/// Consumed bytes are advanced out of `data`. Every visited node, the root
/// included, is re-stored.
///
/// Within an internal node the offset is advanced by the full size of each
/// child that was descended into, not by the bytes written into it, and later
/// children are entered at `offset - cur` under that advanced offset. A write
/// that starts in the middle of one child and spills into the next therefore
/// skips ahead in the next child by the same amount.
#[instrument(level = "debug", skip(store, node, data), fields(remaining = data.len()))]
pub fn overwrite<'a, S: BlockStore>(
    store: &'a S,
    mut node: DagNode,
    offset: u64,
    data: &'a mut Bytes,
) -> BoxFuture<'a, Result<Rewritten>> {
    Box::pin(async move {
        let mut meta = unixfs::decode(&node)?;

        if node.is_leaf() {
            let start = usize::try_from(offset)
                .unwrap_or(usize::MAX)
                .min(meta.data.len());
            let n = data.len().min(meta.data.len() - start);
            meta.data[start..start + n].copy_from_slice(&data[..n]);
            data.advance(n);
            trace!(offset, written = n, "rewrote leaf");

            node.data = meta.to_bytes()?;
            let cid = store.put_ipld(&node).await?;
            return Ok(Rewritten {
                cid,
                node,
                consumed: data.is_empty(),
            });
        }

        let mut offset = offset;
        let mut cur = 0u64;
        let mut consumed = false;
        for (i, &size) in meta.blocksizes.iter().enumerate() {
            if cur + size > offset {
                let child: DagNode = store.get_ipld(&node.links[i].cid).await?;
                let rewritten = overwrite(store, child, offset - cur, &mut *data).await?;

                offset += size;
                node.links[i].cid = rewritten.cid;

                if rewritten.consumed {
                    consumed = true;
                    break;
                }
            }
            cur += size;
        }

        // Block sizes are unchanged, only child CIDs moved
        let cid = store.put_ipld(&node).await?;
        Ok(Rewritten {
            cid,
            node,
            consumed,
        })
    })
}
