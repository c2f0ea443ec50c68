//! CLI argument parsing with clap.

use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use std::path::PathBuf;

use crate::config::RunConfig;

#[derive(Parser, Debug)]
#[command(name = "safelist-analyzer")]
#[command(author, version, about = "Count safe/block rule hits in mail flow log exports")]
#[command(group(ArgGroup::new("list").required(true).args(["safelist", "userlist"])))]
pub struct Cli {
    /// Organization safe/block rule list
    #[arg(short, long, value_name = "FILE")]
    pub safelist: Option<PathBuf>,

    /// Per-user safe/block list export
    #[arg(short, long, value_name = "FILE")]
    pub userlist: Option<PathBuf>,

    /// Output file for the list with hit counts
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Write one row per user list item (user mode only)
    #[arg(short, long, requires = "userlist", conflicts_with = "safelist")]
    pub extended: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Log files to analyze
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Parse process arguments, exiting with usage on invalid combinations
    pub fn parse_checked() -> Self {
        let cli = Self::parse();
        if let Err(e) = cli.check() {
            e.exit();
        }
        cli
    }

    /// Parse `args`, rejecting combinations clap attributes cannot express
    pub fn try_parse_checked<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Self::try_parse_from(args)?;
        cli.check()?;
        Ok(cli)
    }

    fn check(&self) -> Result<(), clap::Error> {
        if self.extended && self.userlist.is_none() {
            return Err(Self::command().error(
                ErrorKind::ArgumentConflict,
                "--extended is only valid with --userlist",
            ));
        }
        Ok(())
    }

    /// Convert parsed arguments into a run configuration
    pub fn into_config(self) -> RunConfig {
        let config = match (self.safelist, self.userlist) {
            (_, Some(list)) => RunConfig::user(list, self.extended),
            (Some(list), None) => RunConfig::global(list),
            // clap enforces one of the two
            (None, None) => RunConfig::global(PathBuf::new()),
        };
        config.with_output(self.output).with_inputs(self.files)
    }
}
