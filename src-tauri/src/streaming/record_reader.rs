//! Streaming RFC 4180 record reader.
//!
//! Scans the source once, byte by byte, and assembles one record at a time.
//! Only the bytes of the record currently being built are buffered, so memory
//! use is bounded by the longest record rather than by file size.
//!
//! Quoted fields may contain commas, `""` escaped quotes and raw line breaks.
//! Records end at an unquoted `\n`, `\r\n` or `\r`, or at end of input. Blank
//! lines are skipped and a trailing line break never yields an empty record.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::mem;
use std::path::Path;

use super::record::Record;
use crate::error::SplitError;

/// Default capacity of the underlying `BufReader`.
pub const DEFAULT_READ_BUFFER: usize = 256 * 1024;

/// Default ceiling on the raw size of a single record (64 MB).
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the first byte of a field (start of record or right after a comma).
    FieldStart,
    /// Inside a field that did not open with a quote.
    Unquoted,
    /// Inside a quoted field.
    Quoted,
    /// Saw a quote inside a quoted field: either an escape or the closing quote.
    QuoteInQuoted,
}

/// What a scan over one buffer produced.
enum Scan {
    /// The whole buffer was consumed without completing a record.
    NeedMore,
    /// A record was completed after consuming this many bytes.
    Record(usize),
}

/// Scanner state, kept apart from the `BufReader` so a filled buffer can be
/// borrowed while the state is mutated.
#[derive(Debug)]
struct Scanner {
    state: State,
    field: Vec<u8>,
    fields: Vec<String>,
    /// Absolute offset of the next byte to scan.
    offset: u64,
    field_start: u64,
    quote_start: u64,
    record_bytes: usize,
    max_record_bytes: usize,
    in_record: bool,
    /// Previous record ended on `\r`; swallow a directly following `\n`.
    skip_lf: bool,
}

impl Scanner {
    fn new(max_record_bytes: usize) -> Self {
        Self {
            state: State::FieldStart,
            field: Vec::new(),
            fields: Vec::new(),
            offset: 0,
            field_start: 0,
            quote_start: 0,
            record_bytes: 0,
            max_record_bytes,
            in_record: false,
            skip_lf: false,
        }
    }

    fn scan(&mut self, buf: &[u8]) -> Result<Scan, SplitError> {
        for (i, &b) in buf.iter().enumerate() {
            let pos = self.offset;
            self.offset += 1;

            if self.skip_lf {
                self.skip_lf = false;
                if b == b'\n' {
                    continue;
                }
            }

            if !self.in_record {
                if b == b'\r' || b == b'\n' {
                    // blank line
                    self.skip_lf = b == b'\r';
                    continue;
                }
                self.in_record = true;
                self.record_bytes = 0;
            }

            self.record_bytes += 1;
            if self.record_bytes > self.max_record_bytes {
                return Err(SplitError::malformed(
                    pos,
                    format!(
                        "record exceeds the {} byte limit (unclosed quote?)",
                        self.max_record_bytes
                    ),
                ));
            }

            match self.state {
                State::FieldStart => {
                    self.field_start = pos;
                    match b {
                        b'"' => {
                            self.quote_start = pos;
                            self.state = State::Quoted;
                        }
                        b',' => self.end_field()?,
                        b'\r' | b'\n' => {
                            self.end_field()?;
                            self.end_record(b);
                            return Ok(Scan::Record(i + 1));
                        }
                        _ => {
                            self.field.push(b);
                            self.state = State::Unquoted;
                        }
                    }
                }
                State::Unquoted => match b {
                    b',' => self.end_field()?,
                    b'\r' | b'\n' => {
                        self.end_field()?;
                        self.end_record(b);
                        return Ok(Scan::Record(i + 1));
                    }
                    _ => self.field.push(b),
                },
                State::Quoted => match b {
                    b'"' => self.state = State::QuoteInQuoted,
                    _ => self.field.push(b),
                },
                State::QuoteInQuoted => match b {
                    b'"' => {
                        self.field.push(b'"');
                        self.state = State::Quoted;
                    }
                    b',' => self.end_field()?,
                    b'\r' | b'\n' => {
                        self.end_field()?;
                        self.end_record(b);
                        return Ok(Scan::Record(i + 1));
                    }
                    _ => {
                        self.field.push(b);
                        self.state = State::Unquoted;
                    }
                },
            }
        }

        Ok(Scan::NeedMore)
    }

    /// Closes the record in progress at end of input, if any.
    fn finish(&mut self) -> Result<Option<Record>, SplitError> {
        if !self.in_record {
            return Ok(None);
        }
        if self.state == State::Quoted {
            return Err(SplitError::malformed(
                self.quote_start,
                "unterminated quoted field at end of input",
            ));
        }
        self.end_field()?;
        self.in_record = false;
        Ok(Some(self.take_record()))
    }

    fn end_field(&mut self) -> Result<(), SplitError> {
        let bytes = mem::take(&mut self.field);
        let text = String::from_utf8(bytes)
            .map_err(|_| SplitError::malformed(self.field_start, "field is not valid UTF-8"))?;
        self.fields.push(text);
        self.state = State::FieldStart;
        Ok(())
    }

    fn end_record(&mut self, terminator: u8) {
        self.in_record = false;
        self.skip_lf = terminator == b'\r';
    }

    fn take_record(&mut self) -> Record {
        Record::new(mem::take(&mut self.fields))
    }
}

/// Forward-only reader yielding one [`Record`] per logical CSV row.
///
/// Not restartable: it consumes the underlying stream. After the first error
/// the iterator is exhausted.
pub struct RecordReader<R: Read> {
    inner: BufReader<R>,
    scanner: Scanner,
    /// Leading bytes matched against the BOM so far.
    bom_seen: usize,
    started: bool,
    done: bool,
}

impl RecordReader<File> {
    /// Opens `path` read-only.
    pub fn from_path(
        path: &Path,
        buffer_bytes: usize,
        max_record_bytes: usize,
    ) -> Result<Self, SplitError> {
        let file = File::open(path).map_err(|e| {
            SplitError::ReadFailure(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::with_limits(file, buffer_bytes, max_record_bytes))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_limits(source, DEFAULT_READ_BUFFER, DEFAULT_MAX_RECORD_BYTES)
    }

    pub fn with_limits(source: R, buffer_bytes: usize, max_record_bytes: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(buffer_bytes.max(UTF8_BOM.len()), source),
            scanner: Scanner::new(max_record_bytes.max(1)),
            bom_seen: 0,
            started: false,
            done: false,
        }
    }

    /// Bytes of the source scanned so far (BOM included).
    pub fn bytes_consumed(&self) -> u64 {
        self.scanner.offset
    }

    /// Reads the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<Record>, SplitError> {
        if self.done {
            return Ok(None);
        }
        let result = self.read_record_inner();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn read_record_inner(&mut self) -> Result<Option<Record>, SplitError> {
        loop {
            let buf = self
                .inner
                .fill_buf()
                .map_err(|e| SplitError::ReadFailure(e.to_string()))?;

            if buf.is_empty() {
                self.release_partial_bom()?;
                return self.scanner.finish();
            }

            // The BOM may arrive split across several short reads
            if !self.started {
                let expected = &UTF8_BOM[self.bom_seen..];
                let n = expected.len().min(buf.len());
                if buf[..n] == expected[..n] {
                    self.inner.consume(n);
                    self.bom_seen += n;
                    if self.bom_seen == UTF8_BOM.len() {
                        self.started = true;
                        self.scanner.offset = UTF8_BOM.len() as u64;
                    }
                } else {
                    self.release_partial_bom()?;
                }
                continue;
            }

            let len = buf.len();
            match self.scanner.scan(buf)? {
                Scan::NeedMore => self.inner.consume(len),
                Scan::Record(used) => {
                    self.inner.consume(used);
                    return Ok(Some(self.scanner.take_record()));
                }
            }
        }
    }
}

impl<R: Read> RecordReader<R> {
    /// Feeds BOM-prefix bytes that turned out not to be a BOM to the scanner.
    fn release_partial_bom(&mut self) -> Result<(), SplitError> {
        if !self.started {
            self.started = true;
            // A BOM prefix holds no terminator, so no record can complete here
            self.scanner.scan(&UTF8_BOM[..self.bom_seen])?;
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, SplitError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<Vec<String>> {
        RecordReader::new(input.as_bytes())
            .map(|r| r.expect("Failed to read record").into_fields())
            .collect()
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_simple_records() {
        let records = parse("id,name\n1,Alice\n2,Bob\n");
        assert_eq!(
            records,
            vec![row(&["id", "name"]), row(&["1", "Alice"]), row(&["2", "Bob"])]
        );
    }

    #[test]
    fn test_no_trailing_newline() {
        assert_eq!(parse("a,b\n1,2"), vec![row(&["a", "b"]), row(&["1", "2"])]);
    }

    #[test]
    fn test_crlf_and_lone_cr_terminators() {
        let records = parse("a,b\r\n1,2\r3,4\n5,6\r\n");
        assert_eq!(
            records,
            vec![row(&["a", "b"]), row(&["1", "2"]), row(&["3", "4"]), row(&["5", "6"])]
        );
    }

    #[test]
    fn test_crlf_split_across_buffer_refills() {
        // A 4 byte buffer puts the \r and \n of the first terminator in different fills
        let input = "abc\r\ndef\r\n";
        let records: Vec<Vec<String>> = RecordReader::with_limits(input.as_bytes(), 4, 1024)
            .map(|r| r.expect("Failed to read record").into_fields())
            .collect();
        assert_eq!(records, vec![row(&["abc"]), row(&["def"])]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        assert_eq!(parse("\n\na\n\r\n\nb\n\n"), vec![row(&["a"]), row(&["b"])]);
        assert!(parse("\n\r\n").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_quoted_field_with_comma_newline_and_escaped_quote() {
        let records = parse("\"He said \"\"hi, there\"\"\nbye\",x\n");
        assert_eq!(records, vec![row(&["He said \"hi, there\"\nbye", "x"])]);
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(parse("a,,c\n,\n"), vec![row(&["a", "", "c"]), row(&["", ""])]);
        assert_eq!(parse("\"\"\n"), vec![row(&[""])]);
        assert_eq!(parse("a,\"\"\n"), vec![row(&["a", ""])]);
    }

    #[test]
    fn test_partially_quoted_field() {
        // Bytes after the closing quote are kept verbatim
        assert_eq!(parse("\"ab\"cd,e\n"), vec![row(&["abcd", "e"])]);
        // A quote that does not open the field is literal
        assert_eq!(parse("ab\"cd,e\n"), vec![row(&["ab\"cd", "e"])]);
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice(b"id,name\n1,A\n");
        let records: Vec<Vec<String>> = RecordReader::new(input.as_slice())
            .map(|r| r.unwrap().into_fields())
            .collect();
        assert_eq!(records[0], row(&["id", "name"]));
    }

    /// Hands out at most one byte per `read` call, like a slow pipe.
    struct OneByteAtATime<'a>(&'a [u8]);

    impl Read for OneByteAtATime<'_> {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), out.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_bom_split_across_short_reads_is_skipped() {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice(b"id,name\n1,A\n");

        let mut reader = RecordReader::new(OneByteAtATime(&input));
        let records: Vec<Vec<String>> = reader
            .by_ref()
            .map(|r| r.unwrap().into_fields())
            .collect();

        assert_eq!(records, vec![row(&["id", "name"]), row(&["1", "A"])]);
        assert_eq!(reader.bytes_consumed(), input.len() as u64);
    }

    #[test]
    fn test_short_reads_without_bom() {
        let records: Vec<Vec<String>> = RecordReader::new(OneByteAtATime(b"\"a\",b\nc,d"))
            .map(|r| r.unwrap().into_fields())
            .collect();
        assert_eq!(records, vec![row(&["a", "b"]), row(&["c", "d"])]);
    }

    #[test]
    fn test_bom_prefix_that_is_not_a_bom_stays_in_the_field() {
        // EF BB followed by 'x' is not a BOM and not valid UTF-8 either
        let mut reader = RecordReader::new(OneByteAtATime(b"\xEF\xBBx,y\n"));
        match reader.next() {
            Some(Err(SplitError::MalformedRecord { offset, .. })) => assert_eq!(offset, 0),
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_quote_reports_opening_offset() {
        let input = "a,b\n1,\"never closed\n2,3\n";
        let mut reader = RecordReader::new(input.as_bytes());

        assert_eq!(reader.next().unwrap().unwrap().into_fields(), row(&["a", "b"]));
        match reader.next() {
            Some(Err(SplitError::MalformedRecord { offset, reason })) => {
                assert_eq!(offset, 6);
                assert!(reason.contains("unterminated"));
            }
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
        // Fused after the error
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let input: &[u8] = b"ok,\xff\xfe\n";
        let mut reader = RecordReader::new(input);
        match reader.next() {
            Some(Err(SplitError::MalformedRecord { offset, .. })) => assert_eq!(offset, 3),
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_record_size_limit() {
        let input = format!("\"{}", "x".repeat(100));
        let mut reader = RecordReader::with_limits(input.as_bytes(), 16, 32);
        match reader.next() {
            Some(Err(SplitError::MalformedRecord { reason, .. })) => {
                assert!(reason.contains("limit"))
            }
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_bytes_consumed_tracks_scan_position() {
        let input = "a,b\n1,2\n";
        let mut reader = RecordReader::new(input.as_bytes());
        reader.read_record().unwrap();
        assert_eq!(reader.bytes_consumed(), 4);
        reader.read_record().unwrap();
        assert_eq!(reader.bytes_consumed(), 8);
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.bytes_consumed(), 8);
    }
}
