use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use safelist_analyzer::cli::Cli;
use safelist_analyzer::runner::{self, RunReport};

fn main() -> Result<()> {
    let cli = Cli::parse_checked();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.into_config();
    let report = runner::run(&config).context("analysis failed")?;

    for problem in report.problems() {
        eprintln!("{}", problem);
    }

    match &report {
        RunReport::Global(r) => tracing::info!(
            rules = r.rules,
            inbound = r.inbound,
            outbound = r.outbound,
            output = %config.output.display(),
            "rule hit counts saved"
        ),
        RunReport::User(r) => tracing::info!(
            users = r.users,
            safe_hits = r.safe_hits,
            block_hits = r.block_hits,
            output = %config.output.display(),
            "user hit counts saved"
        ),
    }
    Ok(())
}
