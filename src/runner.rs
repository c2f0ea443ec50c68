//! End-to-end run: load the list, classify every log file, save.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::analyzer::{FileSummary, GlobalAnalyzer, UserAnalyzer};
use crate::config::{Mode, RunConfig};
use crate::error::Result;
use crate::matcher::PatternError;
use crate::rules::{EntryError, RuleList};
use crate::types::UserMatch;
use crate::users::{UserError, UserList};

/// A log file that could not be opened or read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File: {} Error: {}", self.path.display(), self.message)
    }
}

/// Result of a global mode run
#[derive(Debug, Clone)]
pub struct GlobalReport {
    pub files: Vec<FileSummary>,
    pub failed: Vec<FileFailure>,
    pub entry_errors: Vec<EntryError>,
    pub pattern_errors: Vec<PatternError<usize>>,
    pub rules: usize,
    pub inbound: u64,
    pub outbound: u64,
}

/// Result of a user mode run
#[derive(Debug, Clone)]
pub struct UserReport {
    pub files: Vec<FileSummary>,
    pub failed: Vec<FileFailure>,
    pub user_errors: Vec<UserError>,
    pub pattern_errors: Vec<PatternError<UserMatch>>,
    pub users: usize,
    pub safe_hits: u64,
    pub block_hits: u64,
}

#[derive(Debug, Clone)]
pub enum RunReport {
    Global(GlobalReport),
    User(UserReport),
}

impl RunReport {
    pub fn files(&self) -> &[FileSummary] {
        match self {
            RunReport::Global(r) => &r.files,
            RunReport::User(r) => &r.files,
        }
    }

    pub fn failed(&self) -> &[FileFailure] {
        match self {
            RunReport::Global(r) => &r.failed,
            RunReport::User(r) => &r.failed,
        }
    }

    /// Records classified over all files
    pub fn records(&self) -> u64 {
        self.files().iter().map(|f| f.records).sum()
    }

    /// Messages for every non-fatal problem found during the run
    pub fn problems(&self) -> Vec<String> {
        let failed = self.failed().iter().map(|f| format!("File error: {}", f));
        let list: Vec<String> = match self {
            RunReport::Global(r) => r
                .entry_errors
                .iter()
                .map(|e| format!("Entry error: {}", e))
                .chain(r.pattern_errors.iter().map(|e| format!("Pattern error: {}", e)))
                .collect(),
            RunReport::User(r) => r
                .user_errors
                .iter()
                .map(|e| format!("User error: {}", e))
                .chain(r.pattern_errors.iter().map(|e| format!("Pattern error: {}", e)))
                .collect(),
        };
        list.into_iter().chain(failed).collect()
    }
}

/// Run the analysis described by `config`.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let start = Instant::now();

    let report = match &config.mode {
        Mode::Global { list } => {
            let (mut rules, entry_errors) = RuleList::load(list)?;
            let (analyzer, pattern_errors) = GlobalAnalyzer::new(&rules);
            if !pattern_errors.is_empty() {
                warn!(count = pattern_errors.len(), "some rule patterns failed to compile");
            }

            let (files, failed) =
                process_inputs(&config.inputs, |input| analyzer.process(input, &mut rules));
            rules.save(&config.output)?;

            RunReport::Global(GlobalReport {
                files,
                failed,
                entry_errors,
                pattern_errors,
                rules: rules.len(),
                inbound: rules.inbound_total(),
                outbound: rules.outbound_total(),
            })
        }
        Mode::User { list, extended } => {
            let (mut users, user_errors) = UserList::load(list)?;
            let (analyzer, pattern_errors) = UserAnalyzer::new(&users);
            if !pattern_errors.is_empty() {
                warn!(count = pattern_errors.len(), "some list items failed to compile");
            }

            let (files, failed) =
                process_inputs(&config.inputs, |input| analyzer.process(input, &mut users));
            users.save(&config.output, *extended)?;

            RunReport::User(UserReport {
                files,
                failed,
                user_errors,
                pattern_errors,
                users: users.user_count(),
                safe_hits: users.safe_hit_total(),
                block_hits: users.block_hit_total(),
            })
        }
    };

    info!(
        files = report.files().len(),
        failed = report.failed().len(),
        records = report.records(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(report)
}

/// Process every input in order. A file that cannot be opened or read is
/// logged and recorded, and the remaining files are still processed.
fn process_inputs<F>(inputs: &[PathBuf], mut process: F) -> (Vec<FileSummary>, Vec<FileFailure>)
where
    F: FnMut(&Path) -> Result<FileSummary>,
{
    let mut files = Vec::with_capacity(inputs.len());
    let mut failed = Vec::new();
    for input in inputs {
        match process(input) {
            Ok(summary) => files.push(summary),
            Err(e) => {
                error!(path = %input.display(), error = %e, "failed to process log file");
                failed.push(FileFailure {
                    path: input.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    (files, failed)
}
