//! # dagmod core
//!
//! In-place mutation of files stored as content-addressed Merkle DAGs.
//!
//! This crate provides:
//! - **DagModifier**: A file handle with buffered writes, reads, seeks and truncation
//! - **Editor**: Recursive overwrite of existing leaves
//! - **Appender**: Growth of a file tree under a fan-out limit
//! - **Pruning**: Truncation that keeps untouched subtrees by reference
//! - **Reader**: Streaming reads over a file tree
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              DagModifier                │
//! │   write buffer · cursor · root node     │
//! ├──────────┬──────────┬────────┬──────────┤
//! │  Editor  │ Appender │ Prune  │  Reader  │
//! ├──────────┴──────────┴────────┴──────────┤
//! │        File metadata codec (unixfs)     │
//! ├─────────────────────────────────────────┤
//! │   BlockStore · Pinner · BlockSplitter   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dagmod_core::{unixfs, DagModifier};
//!
//! let mut file = DagModifier::new(&unixfs::empty_file()?, store, pinner, splitter);
//! file.write_at(0, b"hello").await?;
//! let root = file.get_root_cid().await?;
//! ```

pub mod appender;
pub mod editor;
pub mod error;
pub mod modifier;
pub mod reader;
pub mod truncate;
pub mod unixfs;

#[cfg(test)]
mod test_util;

pub use appender::{TreeAppender, DEFAULT_MAX_LINKS};
pub use error::{CoreError, Result};
pub use modifier::{DagModifier, ModifierConfig, Whence, SPARSE_CHUNK_SIZE, WRITE_BUFFER_SIZE};
pub use reader::DagReader;
pub use unixfs::{DataType, FsNode};
