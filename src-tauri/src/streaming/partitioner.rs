//! Groups a record stream into bounded chunks.

use std::num::NonZeroUsize;

use super::record::{Chunk, Record};
use crate::error::SplitError;

/// Cuts a record stream into [`Chunk`]s of at most `rows_per_file` data rows.
///
/// When the source has a header it is pulled off the front once, on
/// construction, and cloned onto every chunk without counting toward the limit.
/// A header with no data rows still yields one header-only chunk; a stream with
/// no records at all yields none.
pub struct ChunkPartitioner<I> {
    records: I,
    rows_per_file: NonZeroUsize,
    header: Option<Record>,
    next_index: usize,
    finished: bool,
}

impl<I> ChunkPartitioner<I>
where
    I: Iterator<Item = Result<Record, SplitError>>,
{
    /// Creates a partitioner, reading the header first when `has_header` is set.
    ///
    /// # Errors
    ///
    /// Propagates a read or parse failure hit while reading the header.
    pub fn new(
        mut records: I,
        rows_per_file: NonZeroUsize,
        has_header: bool,
    ) -> Result<Self, SplitError> {
        let header = if has_header {
            records.next().transpose()?
        } else {
            None
        };

        Ok(Self {
            records,
            rows_per_file,
            header,
            next_index: 1,
            finished: false,
        })
    }

    pub fn header(&self) -> Option<&Record> {
        self.header.as_ref()
    }

    /// The underlying record source, e.g. to query a reader's position.
    pub fn source(&self) -> &I {
        &self.records
    }

    /// Returns the next chunk, or `None` once the stream is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, SplitError> {
        if self.finished {
            return Ok(None);
        }

        let limit = self.rows_per_file.get();
        let mut rows = Vec::with_capacity(limit.min(4096));

        while rows.len() < limit {
            match self.records.next() {
                Some(Ok(record)) => rows.push(record),
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        // Header-only sources still produce their single file
        let header_only = self.next_index == 1 && self.header.is_some();
        if rows.is_empty() && !header_only {
            return Ok(None);
        }

        let chunk = Chunk {
            index: self.next_index,
            header: self.header.clone(),
            records: rows,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

impl<I> Iterator for ChunkPartitioner<I>
where
    I: Iterator<Item = Result<Record, SplitError>>,
{
    type Item = Result<Chunk, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
