//! # dagmod CLI
//!
//! Command-line access to files stored as mutable Merkle DAGs.
//!
//! Every command that changes a file prints the CID of the new root; earlier
//! roots stay readable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     dagmod import | cat | write | ...   │
//! ├─────────────────────────────────────────┤
//! │        Workspace (CliConfig)            │
//! ├─────────────────────────────────────────┤
//! │       DagModifier (dagmod-core)         │
//! ├─────────────────────────────────────────┤
//! │  CachedBlockStore ─▶ FsBlockStore       │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod workspace;

pub use config::CliConfig;
pub use workspace::{CliStore, FileStat, Workspace};
