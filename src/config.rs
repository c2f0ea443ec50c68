use std::path::{Path, PathBuf};

use crate::error::{AnalyzerError, Result};

/// Which list drives the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Organization rule list
    Global { list: PathBuf },
    /// Personal user lists. `extended` writes one output row per list item.
    User { list: PathBuf, extended: bool },
}

impl Mode {
    pub fn list(&self) -> &Path {
        match self {
            Mode::Global { list } | Mode::User { list, .. } => list,
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub mode: Mode,
    /// Where the list is saved with its counters
    pub output: PathBuf,
    /// Log files, processed in order
    pub inputs: Vec<PathBuf>,
}

impl RunConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            output: PathBuf::new(),
            inputs: Vec::new(),
        }
    }

    /// Global mode over the rule list at `list`.
    pub fn global(list: impl Into<PathBuf>) -> Self {
        Self::new(Mode::Global { list: list.into() })
    }

    /// User mode over the user list at `list`.
    pub fn user(list: impl Into<PathBuf>, extended: bool) -> Self {
        Self::new(Mode::User {
            list: list.into(),
            extended,
        })
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn with_inputs<I, P>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Check every path before anything is read or written.
    pub fn validate(&self) -> Result<()> {
        let list = self.mode.list();
        if list.as_os_str().is_empty() {
            return Err(AnalyzerError::Config("list path is empty".into()));
        }
        if !list.is_file() {
            return Err(AnalyzerError::Config(format!(
                "list file {} does not exist",
                list.display()
            )));
        }

        if self.output.as_os_str().is_empty() {
            return Err(AnalyzerError::Config("output path is empty".into()));
        }
        if self.output.is_dir() {
            return Err(AnalyzerError::Config(format!(
                "output {} is a directory",
                self.output.display()
            )));
        }

        if self.inputs.is_empty() {
            return Err(AnalyzerError::Config("no input files given".into()));
        }
        for input in &self.inputs {
            if input.as_os_str().is_empty() {
                return Err(AnalyzerError::Config("input path is empty".into()));
            }
            if !input.is_file() {
                return Err(AnalyzerError::Config(format!(
                    "input file {} does not exist",
                    input.display()
                )));
            }
        }
        Ok(())
    }
}
