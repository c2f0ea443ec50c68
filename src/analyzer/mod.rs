//! Log record classifiers.
//!
//! [`GlobalAnalyzer`] applies the organization rule list to every record.
//! [`UserAnalyzer`] applies personal lists to mail addressed to their owners.

mod global;
mod user;

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

pub use global::{GlobalAnalyzer, GLOBAL_COLUMNS};
pub use user::{UserAnalyzer, USER_LOG_COLUMNS};

static INBOUND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bdefault_inbound\b").expect("INBOUND_PATTERN: hardcoded regex is invalid")
});

static HFROM_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<?\s*([a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*)\s*>?\s*(?:;|$)",
    )
    .expect("HFROM_ADDRESS: hardcoded regex is invalid")
});

/// Whether a record's policy route marks it as inbound mail
#[inline]
pub fn is_inbound(policy_route: &str) -> bool {
    INBOUND_PATTERN.is_match(policy_route)
}

/// Bare address of a Header-From value, or the raw value when no address
/// can be extracted. Display names and angle brackets are dropped.
pub fn header_from_address(header_from: &str) -> &str {
    HFROM_ADDRESS
        .captures(header_from)
        .and_then(|c| c.get(1))
        .map_or(header_from, |m| m.as_str())
}

/// Characters of `s` in reverse order
#[inline]
pub fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

/// Outcome of processing one log file
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: PathBuf,
    /// Data rows classified
    pub records: u64,
    /// Rows that could not be decoded
    pub skipped: usize,
    pub header_found: bool,
    pub elapsed: Duration,
}
