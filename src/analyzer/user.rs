use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use csv::StringRecord;
use tracing::{debug, info, warn};

use super::{header_from_address, reverse, FileSummary};
use crate::error::{AnalyzerError, Result};
use crate::matcher::{Anchor, ListMatcher, PatternError, PatternMatcher, PatternOptions};
use crate::records::{Columns, LogReader};
use crate::types::UserMatch;
use crate::users::{HitSource, ListItem, ListKind, UserList};

/// Log columns the user analyzer reads
pub const USER_LOG_COLUMNS: [&str; 4] = ["Policy_Route", "Header_From", "Sender", "Recipients"];

const HEADER_FROM: usize = 1;
const SENDER: usize = 2;
const RECIPIENTS: usize = 3;

/// Regex source for a reversed list item.
///
/// A domain item must be followed by the end of the candidate or by a label
/// or local-part separator, so `example.com` covers `mail.example.com` but
/// not `notexample.com`. A full address must match the whole candidate.
/// Items that begin with `.` or `@` carry their own boundary.
fn suffix_source(pattern: &str) -> String {
    let reversed = regex::escape(&reverse(pattern));
    if pattern.starts_with(['.', '@']) {
        reversed
    } else if pattern.contains('@') {
        format!("{}$", reversed)
    } else {
        format!("{}(?:$|[.@])", reversed)
    }
}

/// Safe and block matchers of one user
#[derive(Debug)]
struct UserMatchers {
    safe: PatternMatcher<UserMatch>,
    block: PatternMatcher<UserMatch>,
}

impl UserMatchers {
    fn new() -> Self {
        let options = PatternOptions::regex(Anchor::Start).case_insensitive();
        Self {
            safe: PatternMatcher::new(options),
            block: PatternMatcher::new(options),
        }
    }

    fn get(&self, kind: ListKind) -> &PatternMatcher<UserMatch> {
        match kind {
            ListKind::Safe => &self.safe,
            ListKind::Block => &self.block,
        }
    }

    fn get_mut(&mut self, kind: ListKind) -> &mut PatternMatcher<UserMatch> {
        match kind {
            ListKind::Safe => &mut self.safe,
            ListKind::Block => &mut self.block,
        }
    }
}

/// Classifier for personal safe and block lists.
///
/// Items are suffix patterns over sender addresses. They are stored
/// reversed and matched against the reversed sender, which turns each
/// suffix test into a start-anchored match inside one pattern set.
#[derive(Debug)]
pub struct UserAnalyzer {
    addr_to_user: HashMap<String, usize>,
    matchers: Vec<UserMatchers>,
}

impl UserAnalyzer {
    /// Index every user address and compile every list item. Items that
    /// fail to compile are returned and never match.
    pub fn new(users: &UserList) -> (Self, Vec<PatternError<UserMatch>>) {
        let mut addr_to_user = HashMap::new();
        let mut matchers = Vec::with_capacity(users.len());
        let mut errors = Vec::new();

        for (user_index, user) in users.iter().enumerate() {
            for address in user.addresses() {
                match addr_to_user.entry(address.trim().to_lowercase()) {
                    Entry::Vacant(e) => {
                        e.insert(user_index);
                    }
                    Entry::Occupied(e) => {
                        warn!(
                            address,
                            owner = *e.get(),
                            duplicate = user_index,
                            "address already owned by another user"
                        );
                    }
                }
            }

            let mut user_matchers = UserMatchers::new();
            for kind in [ListKind::Safe, ListKind::Block] {
                let matcher = user_matchers.get_mut(kind);
                for (item_index, ListItem { pattern, .. }) in user.list(kind).iter().enumerate() {
                    let hit = UserMatch::new(user_index, item_index);
                    if let Err(e) = matcher.add(&suffix_source(pattern), hit) {
                        let message = match e {
                            AnalyzerError::InvalidPattern { message, .. } => message,
                            other => other.to_string(),
                        };
                        errors.push(PatternError {
                            index: hit,
                            pattern: pattern.clone(),
                            message,
                        });
                    }
                }
            }
            matchers.push(user_matchers);
        }

        debug!(
            users = users.len(),
            addresses = addr_to_user.len(),
            errors = errors.len(),
            "user analyzer built"
        );
        (
            Self {
                addr_to_user,
                matchers,
            },
            errors,
        )
    }

    /// User owning `address`, compared case-insensitively
    pub fn user_for(&self, address: &str) -> Option<usize> {
        self.addr_to_user.get(&address.trim().to_lowercase()).copied()
    }

    /// Classify every record of a log file, counting hits into `users`.
    pub fn process(&self, path: impl AsRef<Path>, users: &mut UserList) -> Result<FileSummary> {
        let path = path.as_ref();
        let log = LogReader::open(path, &USER_LOG_COLUMNS)?;
        self.process_log(log, path, users)
    }

    /// Classify every record read from `reader`.
    pub fn process_reader<R: Read>(&self, reader: R, users: &mut UserList) -> Result<FileSummary> {
        let log = LogReader::from_reader(reader, &USER_LOG_COLUMNS)?;
        self.process_log(log, Path::new("<reader>"), users)
    }

    fn process_log<R: Read>(
        &self,
        mut log: LogReader<R>,
        path: &Path,
        users: &mut UserList,
    ) -> Result<FileSummary> {
        let start = Instant::now();
        let mut summary = FileSummary {
            path: path.to_path_buf(),
            records: 0,
            skipped: 0,
            header_found: false,
            elapsed: Default::default(),
        };

        let Some(columns) = log
            .header()
            .and_then(|h| Columns::resolve(h, &USER_LOG_COLUMNS))
        else {
            warn!(path = %path.display(), "no header found, skipping file");
            summary.skipped = log.skipped();
            summary.elapsed = start.elapsed();
            return Ok(summary);
        };
        summary.header_found = true;

        let mut record = StringRecord::new();
        let mut hits = Vec::new();
        while log.next_record(&mut record) {
            let header_from = reverse(header_from_address(columns.get(&record, HEADER_FROM)));
            let sender = reverse(columns.get(&record, SENDER));

            for recipient in columns.get(&record, RECIPIENTS).split(',') {
                let Some(user_index) = self.user_for(recipient) else {
                    continue;
                };
                let Some(user_matchers) = self.matchers.get(user_index) else {
                    continue;
                };
                for kind in [ListKind::Safe, ListKind::Block] {
                    let matcher = user_matchers.get(kind);
                    if matcher.pattern_count() == 0 {
                        continue;
                    }
                    let mut matched = false;
                    for (candidate, source) in [
                        (&sender, HitSource::Sender),
                        (&header_from, HitSource::HeaderFrom),
                    ] {
                        matched |= matcher.matches_into(candidate, &mut hits);
                        for &hit in &hits {
                            users.record_item_hit(hit, kind, source);
                        }
                    }
                    if matched {
                        users.record_user_hit(user_index, kind);
                    }
                }
            }
            summary.records += 1;
        }

        summary.skipped = log.skipped();
        summary.elapsed = start.elapsed();
        info!(
            path = %path.display(),
            records = summary.records,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "log file processed"
        );
        Ok(summary)
    }
}
