//! Global safe/block rule list.
//!
//! One rule per row: field type, match type, pattern, comment. Saved with
//! the inbound and outbound hit counters appended.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::matcher::parse_subnet_list;
use crate::records::decode_lossy;
use crate::types::{FieldType, MatchType};

/// Column names of a saved rule list
pub const RULE_LIST_HEADER: [&str; 6] = [
    "FieldType",
    "MatchType",
    "Pattern",
    "Comment",
    "Inbound",
    "Outbound",
];

/// A single rule and its hit counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    /// 1-based line in the source file, 0 for rules built in code
    pub line: u64,
    pub field_type: FieldType,
    pub match_type: MatchType,
    pub pattern: String,
    pub comment: String,
    pub inbound: u64,
    pub outbound: u64,
}

impl RuleEntry {
    pub fn new(
        field_type: FieldType,
        match_type: MatchType,
        pattern: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            line: 0,
            field_type,
            match_type,
            pattern: pattern.into(),
            comment: comment.into(),
            inbound: 0,
            outbound: 0,
        }
    }
}

/// A rule row that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    pub line: u64,
    pub field_text: String,
    pub match_text: String,
    pub reason: String,
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line: {} FieldType: {} MatchType: {} Error: {}",
            self.line, self.field_text, self.match_text, self.reason
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RuleRow<'a> {
    field_type: &'a str,
    match_type: &'a str,
    pattern: &'a str,
    comment: &'a str,
    inbound: u64,
    outbound: u64,
}

/// Rule table. Positions are the rule indices every matcher reports, so
/// entries are never reordered or removed once loaded.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    entries: Vec<RuleEntry>,
}

impl RuleList {
    pub fn from_entries(entries: Vec<RuleEntry>) -> Self {
        Self { entries }
    }

    /// Load a rule list file. Rows that cannot be used are returned as
    /// entry errors and left out of the list.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Vec<EntryError>)> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path)?;
        let (list, errors) = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rules = list.len(),
            errors = errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "rule list loaded"
        );
        Ok((list, errors))
    }

    /// Load a rule list from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<(Self, Vec<EntryError>)> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for (row, record) in reader.byte_records().enumerate() {
            let record = decode_lossy(record?);
            let line = record.position().map_or(row as u64 + 1, |p| p.line());
            let field_text = record.get(0).unwrap_or("").trim();
            let match_text = record.get(1).unwrap_or("").trim();

            // Saved lists start with a header row
            if row == 0 && field_text.eq_ignore_ascii_case(RULE_LIST_HEADER[0]) {
                continue;
            }

            let pattern = record.get(2).unwrap_or("");
            match parse_rule(field_text, match_text, pattern) {
                Ok((field_type, match_type)) => entries.push(RuleEntry {
                    line,
                    field_type,
                    match_type,
                    pattern: pattern.to_string(),
                    comment: record.get(3).unwrap_or("").to_string(),
                    inbound: 0,
                    outbound: 0,
                }),
                Err(reason) => errors.push(EntryError {
                    line,
                    field_text: field_text.to_string(),
                    match_text: match_text.to_string(),
                    reason,
                }),
            }
        }

        Ok((Self { entries }, errors))
    }

    /// Save the list with hit counters.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let start = Instant::now();
        self.write_to(File::create(path)?)?;
        info!(
            path = %path.display(),
            rules = self.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "rule list saved"
        );
        Ok(())
    }

    /// Write the list with hit counters. Every field is quoted.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .from_writer(writer);

        writer.write_record(RULE_LIST_HEADER)?;
        for entry in &self.entries {
            writer.serialize(RuleRow {
                field_type: entry.field_type.as_str(),
                match_type: entry.match_type.as_str(),
                pattern: &entry.pattern,
                comment: &entry.comment,
                inbound: entry.inbound,
                outbound: entry.outbound,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Count one hit on rule `index`
    #[inline]
    pub fn record_hit(&mut self, index: usize, inbound: bool) {
        debug_assert!(index < self.entries.len(), "rule index out of range");
        if let Some(entry) = self.entries.get_mut(index) {
            if inbound {
                entry.inbound += 1;
            } else {
                entry.outbound += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RuleEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Sum of inbound hits over all rules
    pub fn inbound_total(&self) -> u64 {
        self.entries.iter().map(|e| e.inbound).sum()
    }

    /// Sum of outbound hits over all rules
    pub fn outbound_total(&self) -> u64 {
        self.entries.iter().map(|e| e.outbound).sum()
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a RuleEntry;
    type IntoIter = std::slice::Iter<'a, RuleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Resolve field and match type of a row, or explain why it is unusable
fn parse_rule(
    field_text: &str,
    match_text: &str,
    pattern: &str,
) -> std::result::Result<(FieldType, MatchType), String> {
    let field_type = field_text.parse::<FieldType>();
    let match_type = match_text.parse::<MatchType>();

    let (field_type, match_type) = match (field_type, match_type) {
        (Ok(ft), Ok(mt)) => (ft, mt),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
        (Err(fe), Err(me)) => return Err(format!("{}, {}", fe, me)),
    };

    if match_type.is_subnet() {
        if field_type != FieldType::Ip {
            return Err(format!(
                "{} only applies to {}",
                match_type,
                FieldType::Ip
            ));
        }
        parse_subnet_list(pattern).map_err(|e| e.to_string())?;
    }

    Ok((field_type, match_type))
}
