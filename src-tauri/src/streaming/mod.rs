//! Streaming building blocks for splitting large CSV files.
//!
//! A record-aware reader that preserves embedded commas, quotes and newlines,
//! a partitioner that cuts the record stream into header-carrying chunks, and
//! atomic CSV/XLSX writers with automatic cleanup on failure.

mod atomic_writer;
mod output;
mod partitioner;
mod record;
mod record_reader;

pub use atomic_writer::{AtomicCsvWriter, AtomicFile};
pub use output::{
    write_chunk, OutputFile, OutputFormat, OutputNaming, XLSX_MAX_COLS, XLSX_MAX_ROWS,
};
pub use partitioner::ChunkPartitioner;
pub use record::{Chunk, Record};
pub use record_reader::{RecordReader, DEFAULT_MAX_RECORD_BYTES, DEFAULT_READ_BUFFER};
