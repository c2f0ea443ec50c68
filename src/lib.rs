//! Safelist Analyzer - count safe/block rule hits in mail flow log exports
//!
//! This library classifies delimited mail log records against:
//! - An organization rule list, counting inbound and outbound hits per rule
//! - Per-user personal safe/block lists, counting hits per list item
//!
//! # Example
//!
//! ```rust
//! use safelist_analyzer::{GlobalAnalyzer, RuleList};
//!
//! let rules_text = "\
//! FieldType,MatchType,Pattern,Comment,Inbound,Outbound
//! $ip,ip_in_net,10.0.0.0/24,Internal relays,0,0
//! $host,match,example.com,,0,0
//! ";
//! let (mut rules, entry_errors) = RuleList::from_reader(rules_text.as_bytes()).unwrap();
//! assert!(entry_errors.is_empty());
//!
//! let (analyzer, pattern_errors) = GlobalAnalyzer::new(&rules);
//! assert!(pattern_errors.is_empty());
//!
//! let log = "\
//! Policy_Route,Sender_IP_Address,Sender_Host,HELO,Header_From,Sender,Recipients
//! default_inbound,10.0.0.5,mx.example.com,mx,a@example.com,a@example.com,b@corp.example
//! ";
//! let summary = analyzer.process_reader(log.as_bytes(), &mut rules).unwrap();
//! assert_eq!(summary.records, 1);
//! assert_eq!(rules.get(0).unwrap().inbound, 1);
//! assert_eq!(rules.get(1).unwrap().inbound, 1);
//! ```
//!
//! # Rule List Format
//!
//! ```text
//! FieldType,MatchType,Pattern,Comment,Inbound,Outbound
//! ```
//!
//! ## Field Types
//!
//! | Token | Log column |
//! |-------|------------|
//! | `$ip` | `Sender_IP_Address` |
//! | `$host` | `Sender_Host` |
//! | `$helo` | `HELO` |
//! | `$hfrom` | `Header_From` (bare address) |
//! | `$from` | `Sender` |
//! | `$rcpt` | `Recipients` |
//!
//! ## Match Types
//!
//! | Token | Fires when |
//! |-------|------------|
//! | `equal` / `not_equal` | value is / is not exactly the pattern |
//! | `match` / `not_match` | value does / does not contain the pattern |
//! | `regex` / `not_regex` | regex does / does not match the value |
//! | `ip_in_net` | `$ip` is inside any of the comma separated CIDRs |
//! | `ip_not_in_net` | `$ip` is inside none of them |
//! | `is_in_domainset` | reserved, never fires |
//!
//! Every rule that fires for a record is counted.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod records;
pub mod rules;
pub mod runner;
pub mod types;
pub mod users;

// Re-export commonly used items
pub use analyzer::{FileSummary, GlobalAnalyzer, UserAnalyzer};
pub use config::{Mode, RunConfig};
pub use error::{AnalyzerError, Result};
pub use matcher::{
    AddressMatcher, Anchor, InvertedPatternMatcher, ListMatcher, Matcher, PatternError,
    PatternMatcher, PatternOptions, StringMatcher, Subnet,
};
pub use records::LogReader;
pub use rules::{EntryError, RuleEntry, RuleList};
pub use runner::{run, RunReport};
pub use types::{FieldType, MatchType, UserMatch};
pub use users::{ListItem, ListKind, UserEntry, UserError, UserList};
