//! Per-user personal safe and block lists.
//!
//! Loaded from a directory export with one user per row. The address and
//! list columns hold `;` separated values.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::{QuoteStyle, StringRecord, Terminator, WriterBuilder};
use serde::Serialize;
use tracing::info;

use crate::error::{AnalyzerError, Result};
use crate::records::{Columns, LogReader};
use crate::types::UserMatch;

/// Columns a user export must contain
pub const USER_COLUMNS: [&str; 6] = [
    "givenName",
    "sn",
    "mail",
    "mailLocalAddress",
    "safelist",
    "blocklist",
];

const USER_HEADER: [&str; 8] = [
    "givenName",
    "sn",
    "mail",
    "mailLocalAddress",
    "safelist",
    "blocklist",
    "safe_count",
    "block_count",
];

const EXTENDED_HEADER: [&str; 7] = [
    "givenName",
    "sn",
    "mail",
    "list",
    "pattern",
    "sender_count",
    "hfrom_count",
];

/// Which personal list an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Safe,
    Block,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Safe => "safe",
            ListKind::Block => "block",
        }
    }
}

/// Which log field produced a list item hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    Sender,
    HeaderFrom,
}

/// One safe or block list pattern with its hit counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub pattern: String,
    pub sender_hits: u64,
    pub header_from_hits: u64,
}

impl ListItem {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            sender_hits: 0,
            header_from_hits: 0,
        }
    }
}

/// A user, their addresses and their personal lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEntry {
    pub given_name: String,
    pub surname: String,
    pub mail: String,
    pub proxy_addresses: Vec<String>,
    pub safe: Vec<ListItem>,
    pub block: Vec<ListItem>,
    pub safe_hits: u64,
    pub block_hits: u64,
}

impl UserEntry {
    /// Primary address followed by proxy addresses
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.mail.as_str())
            .filter(|m| !m.is_empty())
            .chain(self.proxy_addresses.iter().map(String::as_str))
    }

    pub fn list(&self, kind: ListKind) -> &[ListItem] {
        match kind {
            ListKind::Safe => &self.safe,
            ListKind::Block => &self.block,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<ListItem> {
        match kind {
            ListKind::Safe => &mut self.safe,
            ListKind::Block => &mut self.block,
        }
    }
}

/// A user row that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    pub line: u64,
    pub message: String,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line: {} Error: {}", self.line, self.message)
    }
}

#[derive(Serialize)]
struct UserRow<'a> {
    #[serde(rename = "givenName")]
    given_name: &'a str,
    sn: &'a str,
    mail: &'a str,
    #[serde(rename = "mailLocalAddress")]
    mail_local_address: String,
    safelist: String,
    blocklist: String,
    safe_count: u64,
    block_count: u64,
}

#[derive(Serialize)]
struct ItemRow<'a> {
    #[serde(rename = "givenName")]
    given_name: &'a str,
    sn: &'a str,
    mail: &'a str,
    list: &'a str,
    pattern: &'a str,
    sender_count: u64,
    hfrom_count: u64,
}

/// User table. Positions are the user indices used by the user analyzer.
#[derive(Debug, Clone, Default)]
pub struct UserList {
    entries: Vec<UserEntry>,
}

impl UserList {
    pub fn from_entries(entries: Vec<UserEntry>) -> Self {
        Self { entries }
    }

    /// Load a user export. The file must contain the user header.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Vec<UserError>)> {
        let path = path.as_ref();
        let start = Instant::now();
        let log = LogReader::open(path, &USER_COLUMNS)?;
        let (list, errors) = Self::read_users(log, path)?;
        info!(
            path = %path.display(),
            users = list.len(),
            addresses = list.address_count(),
            errors = errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "user list loaded"
        );
        Ok((list, errors))
    }

    /// Load a user export from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<(Self, Vec<UserError>)> {
        let log = LogReader::from_reader(reader, &USER_COLUMNS)?;
        Self::read_users(log, Path::new("<reader>"))
    }

    fn read_users<R: Read>(
        mut log: LogReader<R>,
        path: &Path,
    ) -> Result<(Self, Vec<UserError>)> {
        let columns = log
            .header()
            .and_then(|h| Columns::resolve(h, &USER_COLUMNS))
            .ok_or_else(|| AnalyzerError::HeaderNotFound {
                path: PathBuf::from(path),
            })?;

        let mut entries = Vec::new();
        let mut errors = Vec::new();
        let mut record = StringRecord::new();

        while log.next_record(&mut record) {
            let line = record.position().map_or(0, |p| p.line());
            let user = UserEntry {
                given_name: columns.get(&record, 0).to_string(),
                surname: columns.get(&record, 1).to_string(),
                mail: columns.get(&record, 2).trim().to_string(),
                proxy_addresses: split_list(columns.get(&record, 3)),
                safe: split_list(columns.get(&record, 4))
                    .into_iter()
                    .map(ListItem::new)
                    .collect(),
                block: split_list(columns.get(&record, 5))
                    .into_iter()
                    .map(ListItem::new)
                    .collect(),
                safe_hits: 0,
                block_hits: 0,
            };

            if user.addresses().next().is_none() {
                errors.push(UserError {
                    line,
                    message: "user has no mail or mailLocalAddress".to_string(),
                });
                continue;
            }
            entries.push(user);
        }

        Ok((Self { entries }, errors))
    }

    /// Save the list. Extended output has one row per list item with its
    /// sender and header-from hit counts.
    pub fn save(&self, path: impl AsRef<Path>, extended: bool) -> Result<()> {
        let path = path.as_ref();
        let start = Instant::now();
        self.write_to(File::create(path)?, extended)?;
        info!(
            path = %path.display(),
            users = self.len(),
            extended,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "user list saved"
        );
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W, extended: bool) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .from_writer(writer);

        if extended {
            writer.write_record(EXTENDED_HEADER)?;
            for user in &self.entries {
                for kind in [ListKind::Safe, ListKind::Block] {
                    for item in user.list(kind) {
                        writer.serialize(ItemRow {
                            given_name: &user.given_name,
                            sn: &user.surname,
                            mail: &user.mail,
                            list: kind.as_str(),
                            pattern: &item.pattern,
                            sender_count: item.sender_hits,
                            hfrom_count: item.header_from_hits,
                        })?;
                    }
                }
            }
        } else {
            writer.write_record(USER_HEADER)?;
            for user in &self.entries {
                writer.serialize(UserRow {
                    given_name: &user.given_name,
                    sn: &user.surname,
                    mail: &user.mail,
                    mail_local_address: user.proxy_addresses.join(";"),
                    safelist: join_patterns(&user.safe),
                    blocklist: join_patterns(&user.block),
                    safe_count: user.safe_hits,
                    block_count: user.block_hits,
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Count a hit on one list item
    #[inline]
    pub fn record_item_hit(&mut self, hit: UserMatch, kind: ListKind, source: HitSource) {
        if let Some(item) = self
            .entries
            .get_mut(hit.user_index)
            .and_then(|u| u.list_mut(kind).get_mut(hit.item_index))
        {
            match source {
                HitSource::Sender => item.sender_hits += 1,
                HitSource::HeaderFrom => item.header_from_hits += 1,
            }
        }
    }

    /// Count a hit on a user's safe or block list as a whole
    #[inline]
    pub fn record_user_hit(&mut self, user_index: usize, kind: ListKind) {
        if let Some(user) = self.entries.get_mut(user_index) {
            match kind {
                ListKind::Safe => user.safe_hits += 1,
                ListKind::Block => user.block_hits += 1,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.len()
    }

    pub fn get(&self, index: usize) -> Option<&UserEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UserEntry> {
        self.entries.iter()
    }

    /// Number of primary and proxy addresses over all users
    pub fn address_count(&self) -> usize {
        self.entries.iter().map(|u| u.addresses().count()).sum()
    }

    pub fn safe_item_count(&self) -> usize {
        self.entries.iter().map(|u| u.safe.len()).sum()
    }

    pub fn block_item_count(&self) -> usize {
        self.entries.iter().map(|u| u.block.len()).sum()
    }

    pub fn safe_hit_total(&self) -> u64 {
        self.entries.iter().map(|u| u.safe_hits).sum()
    }

    pub fn block_hit_total(&self) -> u64 {
        self.entries.iter().map(|u| u.block_hits).sum()
    }
}

impl<'a> IntoIterator for &'a UserList {
    type Item = &'a UserEntry;
    type IntoIter = std::slice::Iter<'a, UserEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn join_patterns(items: &[ListItem]) -> String {
    items
        .iter()
        .map(|i| i.pattern.as_str())
        .collect::<Vec<_>>()
        .join(";")
}
