//! Pinning: protecting DAG nodes from garbage collection
//!
//! A pin marks a CID as reachable so a collector sweeping the store leaves it
//! alone. Nodes written while a tree is under construction are pinned
//! `Indirect`; the caller that owns the finished root decides whether to pin it
//! `Recursive`.

use crate::Result;
use async_trait::async_trait;
use cid::Cid;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a CID is pinned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Only this block
    Direct,
    /// Reachable from another pinned root
    Indirect,
    /// This block and everything below it
    Recursive,
}

/// Trait for pin bookkeeping
#[async_trait]
pub trait Pinner: Send + Sync {
    /// Pin a CID with the given mode
    async fn pin(&self, cid: &Cid, mode: PinMode) -> Result<()>;

    /// Remove a pin
    async fn unpin(&self, cid: &Cid) -> Result<()>;

    /// Check if a CID is pinned in any mode
    async fn is_pinned(&self, cid: &Cid) -> Result<bool>;
}

/// In-memory pin set
#[derive(Clone, Default)]
pub struct MemoryPinner {
    pins: Arc<DashMap<Cid, PinMode>>,
}

impl MemoryPinner {
    /// Create an empty pin set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pinned CIDs
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Check if nothing is pinned
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Mode a CID is pinned with, if any
    pub fn mode(&self, cid: &Cid) -> Option<PinMode> {
        self.pins.get(cid).map(|entry| *entry.value())
    }
}

#[async_trait]
impl Pinner for MemoryPinner {
    async fn pin(&self, cid: &Cid, mode: PinMode) -> Result<()> {
        // A stronger pin is never downgraded by a later indirect one
        self.pins
            .entry(*cid)
            .and_modify(|existing| {
                if *existing == PinMode::Indirect {
                    *existing = mode;
                }
            })
            .or_insert(mode);
        Ok(())
    }

    async fn unpin(&self, cid: &Cid) -> Result<()> {
        self.pins.remove(cid);
        Ok(())
    }

    async fn is_pinned(&self, cid: &Cid) -> Result<bool> {
        Ok(self.pins.contains_key(cid))
    }
}
