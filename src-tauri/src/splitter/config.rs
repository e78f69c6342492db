use crate::streaming::{DEFAULT_MAX_RECORD_BYTES, DEFAULT_READ_BUFFER};

/// Tunables for a split run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    /// Capacity of the input read buffer (default: 256 KB).
    pub read_buffer_bytes: usize,
    /// Largest raw record accepted before the input is declared malformed
    /// (default: 64 MB).
    pub max_record_bytes: usize,
    /// Completed chunks that may wait for the background writer.
    /// `0` writes each chunk inline before the next one is read.
    pub write_queue_depth: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            read_buffer_bytes: DEFAULT_READ_BUFFER,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            write_queue_depth: 0,
        }
    }
}

impl SplitConfig {
    /// Sets the read buffer capacity.
    pub fn read_buffer_bytes(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes;
        self
    }

    /// Sets the per-record size ceiling.
    pub fn max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Sets the background write queue depth.
    pub fn write_queue_depth(mut self, depth: usize) -> Self {
        self.write_queue_depth = depth;
        self
    }

    pub fn is_pipelined(&self) -> bool {
        self.write_queue_depth > 0
    }
}
