//! Delimited log reader with header discovery.
//!
//! Exports often carry a preamble before the real column header, so the
//! header is located by scanning rows until one names every required
//! column.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::Path;

use csv::{ByteRecord, Reader, ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::error::Result;

/// Column positions of the located header
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    /// Build a map from a header row. The first occurrence of a duplicated
    /// name wins.
    fn from_record(record: &StringRecord) -> Self {
        let mut columns = HashMap::with_capacity(record.len());
        for (i, name) in record.iter().enumerate() {
            columns.entry(name.trim().to_string()).or_insert(i);
        }
        Self { columns }
    }

    fn contains_all(&self, required: &[&str]) -> bool {
        required.iter().all(|name| self.columns.contains_key(*name))
    }

    /// Position of a column
    pub fn index(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }
}

/// Decode a raw row, replacing invalid UTF-8 with U+FFFD. The row keeps
/// its source position.
pub fn decode_lossy(bytes: ByteRecord) -> StringRecord {
    let position = bytes.position().cloned();
    let mut record = StringRecord::from_byte_record_lossy(bytes);
    record.set_position(position);
    record
}

/// Reader over the data rows that follow a located header
pub struct LogReader<R> {
    reader: Reader<R>,
    buffer: ByteRecord,
    header: Option<HeaderMap>,
    header_line: Option<u64>,
    skipped: usize,
}

impl LogReader<File> {
    /// Open a log file and locate its header.
    pub fn open(path: impl AsRef<Path>, required: &[&str]) -> Result<Self> {
        Self::from_reader(File::open(path.as_ref())?, required)
    }
}

impl<R: Read> LogReader<R> {
    /// Locate the header in any reader. A reader without the header is not
    /// an error; it yields no records.
    pub fn from_reader(reader: R, required: &[&str]) -> Result<Self> {
        let mut log = Self {
            reader: ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(reader),
            buffer: ByteRecord::new(),
            header: None,
            header_line: None,
            skipped: 0,
        };

        loop {
            match log.reader.read_byte_record(&mut log.buffer) {
                Ok(true) => {
                    let record = decode_lossy(mem::take(&mut log.buffer));
                    let header = HeaderMap::from_record(&record);
                    if header.contains_all(required) {
                        log.header_line = record.position().map(|p| p.line());
                        log.header = Some(header);
                        break;
                    }
                }
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(e.into()),
                // Preamble rows may be anything, keep looking
                Err(_) => log.skipped += 1,
            }
        }
        Ok(log)
    }

    pub fn header_found(&self) -> bool {
        self.header.is_some()
    }

    /// 1-based line of the header row
    pub fn header_line(&self) -> Option<u64> {
        self.header_line
    }

    pub fn header(&self) -> Option<&HeaderMap> {
        self.header.as_ref()
    }

    /// Rows that could not be decoded, before or after the header
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Read the next data row into `record`. Cells that are not valid UTF-8
    /// are decoded lossily so the rest of the row still counts. Rows the
    /// parser rejects are skipped with a warning. Returns `false` at end of
    /// input or when no header was found.
    pub fn next_record(&mut self, record: &mut StringRecord) -> bool {
        if self.header.is_none() {
            return false;
        }
        loop {
            match self.reader.read_byte_record(&mut self.buffer) {
                Ok(false) => return false,
                Ok(true) => {
                    let bytes = mem::take(&mut self.buffer);
                    if std::str::from_utf8(bytes.as_slice()).is_err() {
                        debug!(
                            line = bytes.position().map_or(0, |p| p.line()),
                            "row has invalid UTF-8, decoding lossily"
                        );
                    }
                    *record = decode_lossy(bytes);
                    return true;
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, "skipping malformed log row");
                    if e.is_io_error() {
                        return false;
                    }
                }
            }
        }
    }
}

/// Column positions resolved once per file, for a fixed set of names
#[derive(Debug, Clone)]
pub struct Columns<const N: usize> {
    indices: [usize; N],
}

impl<const N: usize> Columns<N> {
    /// Resolve `names` against a header that is known to contain them
    pub fn resolve(header: &HeaderMap, names: &[&str; N]) -> Option<Self> {
        let mut indices = [0usize; N];
        for (slot, name) in indices.iter_mut().zip(names) {
            *slot = header.index(name)?;
        }
        Some(Self { indices })
    }

    /// Value of column `n` in `record`; missing cells read as empty
    #[inline]
    pub fn get<'r>(&self, record: &'r StringRecord, n: usize) -> &'r str {
        record.get(self.indices[n]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 2] = ["Sender", "Recipients"];

    fn rows<R: Read>(log: &mut LogReader<R>) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut record = StringRecord::new();
        while log.next_record(&mut record) {
            out.push(record.iter().map(String::from).collect());
        }
        out
    }

    #[test]
    fn test_header_on_first_row() {
        let text = "Sender,Recipients\na@x.com,b@y.com\n";
        let mut log = LogReader::from_reader(text.as_bytes(), &REQUIRED).unwrap();
        assert!(log.header_found());
        assert_eq!(log.header_line(), Some(1));
        assert_eq!(rows(&mut log), vec![vec!["a@x.com", "b@y.com"]]);
    }

    #[test]
    fn test_header_after_preamble() {
        let text = "Smart Search Export\nGenerated,2024-01-01\n\
                    Extra,Recipients,Sender\n1,r@y.com,s@x.com\n";
        let mut log = LogReader::from_reader(text.as_bytes(), &REQUIRED).unwrap();
        assert!(log.header_found());
        assert_eq!(log.header_line(), Some(3));

        let header = log.header().unwrap().clone();
        let columns = Columns::resolve(&header, &REQUIRED).unwrap();
        let mut record = StringRecord::new();
        assert!(log.next_record(&mut record));
        assert_eq!(columns.get(&record, 0), "s@x.com");
        assert_eq!(columns.get(&record, 1), "r@y.com");
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let text = "Sender,Recipients,Sender\nfirst,r,second\n";
        let mut log = LogReader::from_reader(text.as_bytes(), &REQUIRED).unwrap();
        let header = log.header().unwrap().clone();
        let columns = Columns::resolve(&header, &REQUIRED).unwrap();
        let mut record = StringRecord::new();
        assert!(log.next_record(&mut record));
        assert_eq!(columns.get(&record, 0), "first");
    }

    #[test]
    fn test_missing_header_yields_nothing() {
        let text = "Sender,To\na,b\n";
        let mut log = LogReader::from_reader(text.as_bytes(), &REQUIRED).unwrap();
        assert!(!log.header_found());
        assert!(rows(&mut log).is_empty());
    }

    #[test]
    fn test_short_rows_read_empty() {
        let text = "Sender,Recipients\nonly-sender\n";
        let mut log = LogReader::from_reader(text.as_bytes(), &REQUIRED).unwrap();
        let header = log.header().unwrap().clone();
        let columns = Columns::resolve(&header, &REQUIRED).unwrap();
        let mut record = StringRecord::new();
        assert!(log.next_record(&mut record));
        assert_eq!(columns.get(&record, 1), "");
    }

    #[test]
    fn test_invalid_utf8_cells_decoded_lossily() {
        let mut bytes = b"Sender,Recipients\n".to_vec();
        bytes.extend_from_slice(b"Jos\xe9 <j@x.com>,r@y.com\n");
        bytes.extend_from_slice(b"good,row\n");
        let mut log = LogReader::from_reader(bytes.as_slice(), &REQUIRED).unwrap();

        let mut record = StringRecord::new();
        assert!(log.next_record(&mut record));
        assert_eq!(record.get(0), Some("Jos\u{FFFD} <j@x.com>"));
        assert_eq!(record.get(1), Some("r@y.com"));
        assert_eq!(record.position().map(|p| p.line()), Some(2));

        assert_eq!(rows(&mut log), vec![vec!["good", "row"]]);
        assert_eq!(log.skipped(), 0);
    }

    #[test]
    fn test_invalid_utf8_in_preamble_does_not_hide_header() {
        let mut bytes = b"Export \xff\xfe\n".to_vec();
        bytes.extend_from_slice(b"Sender,Recipients\n");
        bytes.extend_from_slice(b"a,b\n");
        let mut log = LogReader::from_reader(bytes.as_slice(), &REQUIRED).unwrap();
        assert_eq!(log.header_line(), Some(2));
        assert_eq!(rows(&mut log), vec![vec!["a", "b"]]);
    }
}
