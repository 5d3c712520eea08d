//! File chunking
//!
//! Splits byte streams into blocks before they are appended to a DAG

use crate::{BlockStoreError, Result, DEFAULT_CHUNK_SIZE, MAX_BLOCK_SIZE};
use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read};

/// Lazy sequence of blocks produced by a splitter
pub type Blocks<'a> = Box<dyn Iterator<Item = Result<Bytes>> + Send + 'a>;

/// A policy for cutting a byte stream into blocks
pub trait BlockSplitter: Send + Sync {
    /// Split the reader into blocks, reading only as blocks are pulled
    fn split<'a>(&self, reader: Box<dyn Read + Send + 'a>) -> Blocks<'a>;
}

/// Configuration for the chunker
#[derive(Clone, Debug)]
pub struct ChunkerConfig {
    /// Size of each chunk in bytes
    pub chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkerConfig {
    /// Create with a custom chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_BLOCK_SIZE {
            return Err(BlockStoreError::Configuration(format!(
                "chunk size must be between 1 and {} bytes",
                MAX_BLOCK_SIZE
            )));
        }
        Ok(Self { chunk_size })
    }
}

/// Fixed-size chunker
#[derive(Clone, Debug, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Get the chunk size
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }
}

impl BlockSplitter for Chunker {
    fn split<'a>(&self, reader: Box<dyn Read + Send + 'a>) -> Blocks<'a> {
        Box::new(ChunkStream {
            reader,
            chunk_size: self.config.chunk_size,
            done: false,
        })
    }
}

/// Iterator yielding `chunk_size` blocks from a reader
struct ChunkStream<'a> {
    reader: Box<dyn Read + Send + 'a>,
    chunk_size: usize,
    done: bool,
}

impl Iterator for ChunkStream<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buffer = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;

        // Short reads are coalesced so boundaries only depend on content length
        while filled < self.chunk_size {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }

        if filled == 0 {
            return None;
        }
        buffer.truncate(filled);
        Some(Ok(buffer.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.step).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn collect(blocks: Blocks<'_>) -> Vec<Bytes> {
        blocks.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_split_default_size() {
        let data = vec![0u8; 1024 * 1024]; // 1 MB
        let chunker = Chunker::new();
        let blocks = collect(chunker.split(Box::new(Cursor::new(data))));

        assert_eq!(blocks.len(), 4); // 1MB / 256KB = 4
        assert!(blocks.iter().all(|b| b.len() == DEFAULT_CHUNK_SIZE));
    }

    #[test]
    fn test_split_empty() {
        let chunker = Chunker::new();
        let blocks = collect(chunker.split(Box::new(std::io::empty())));
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_split_reassembles() {
        let original: Vec<u8> = (1..=10).collect();
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(3).unwrap());
        let blocks = collect(chunker.split(Box::new(Cursor::new(original.clone()))));

        assert_eq!(
            blocks.iter().map(|b| b.len()).collect::<Vec<_>>(),
            vec![3, 3, 3, 1]
        );
        assert_eq!(blocks.concat(), original);
    }

    #[test]
    fn test_short_reads_do_not_move_boundaries() {
        let data: Vec<u8> = (0..100u8).collect();
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(16).unwrap());

        let whole = collect(chunker.split(Box::new(Cursor::new(data.clone()))));
        let trickled = collect(chunker.split(Box::new(Trickle {
            data,
            pos: 0,
            step: 5,
        })));

        assert_eq!(whole, trickled);
    }

    #[test]
    fn test_zero_stream() {
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(4096).unwrap());
        let blocks = collect(chunker.split(Box::new(std::io::repeat(0).take(10_000))));

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], blocks[1]);
        assert_eq!(blocks[2].len(), 10_000 - 2 * 4096);
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(ChunkerConfig::with_chunk_size(0).is_err());
        assert!(ChunkerConfig::with_chunk_size(MAX_BLOCK_SIZE + 1).is_err());
        assert!(ChunkerConfig::with_chunk_size(MAX_BLOCK_SIZE).is_ok());
    }

    #[rstest]
    #[case(0, 256, 0)]
    #[case(100, 256, 1)]
    #[case(256, 256, 1)]
    #[case(257, 256, 2)]
    #[case(1024, 256, 4)]
    fn test_block_count(#[case] size: usize, #[case] chunk: usize, #[case] expected: usize) {
        let chunker = Chunker::with_config(ChunkerConfig::with_chunk_size(chunk).unwrap());
        let blocks = collect(chunker.split(Box::new(Cursor::new(vec![7u8; size]))));

        assert_eq!(blocks.len(), expected);
        assert_eq!(blocks.iter().map(|b| b.len()).sum::<usize>(), size);
    }
}
