//! Record and chunk types passed between the reader, partitioner and writers.

/// One logical CSV row.
///
/// A record may have spanned several physical lines in the source when a quoted
/// field embedded line breaks; the fields hold the unescaped text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

impl From<Vec<String>> for Record {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl<const N: usize> From<[&str; N]> for Record {
    fn from(fields: [&str; N]) -> Self {
        Self::new(fields.iter().map(|f| f.to_string()).collect())
    }
}

/// The group of records written to one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position of this chunk in the run.
    pub index: usize,
    /// Header row repeated at the top of every chunk, when the source has one.
    pub header: Option<Record>,
    /// Data rows. Never counts the header.
    pub records: Vec<Record>,
}

impl Chunk {
    /// Number of data rows (header excluded).
    pub fn data_rows(&self) -> usize {
        self.records.len()
    }
}
