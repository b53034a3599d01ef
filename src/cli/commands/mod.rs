//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod archive;
mod cleanup;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;
use crate::models::LanguageFilter;

#[derive(Parser)]
#[command(name = "gztarchiver")]
#[command(about = "Resumable, crash-safe archiver for government gazette documents")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Archive root directory (overrides config file and environment)
    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Year, month, day and language a command applies to.
#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Year to archive
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
    pub year: i32,

    /// Restrict to one month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Restrict to one day of the month (1-31, requires --month)
    #[arg(long, requires = "month", value_parser = clap::value_parser!(u32).range(1..=31))]
    pub day: Option<u32>,

    /// Language to fetch: en, si, ta or all
    #[arg(long, default_value = "all")]
    pub lang: LanguageFilter,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one batch of documents for a year
    Archive {
        /// JSON file of document records from the table scraper
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Candidates per run (overrides config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Start at this candidate index instead of the checkpoint
        #[arg(long)]
        start_index: Option<usize>,

        /// Ignore the stored checkpoint and start at 0
        #[arg(long)]
        ignore_state: bool,

        /// Failed attempts before a document is skipped (overrides config)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Concurrent downloads (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write the result list here instead of <year>/archive_results.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show a progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Show checkpoint and ledger counts for a year
    Status {
        /// Year to inspect
        #[arg(long)]
        year: i32,
    },

    /// Remove stray temp files and undersized artifacts for a year
    Cleanup {
        /// Year to clean
        #[arg(long)]
        year: i32,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref()).await?;
    if let Some(dir) = cli.archive_dir {
        settings.archive_dir = dir;
    }

    match cli.command {
        Commands::Archive {
            input,
            filter,
            batch_size,
            start_index,
            ignore_state,
            max_retries,
            concurrency,
            output,
            progress,
        } => {
            if let Some(n) = batch_size {
                settings.batch_size = n;
            }
            if let Some(n) = max_retries {
                settings.max_retries = n;
            }
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            settings.validate()?;

            archive::cmd_archive(
                &settings,
                archive::ArchiveRequest {
                    input,
                    filter,
                    start_index,
                    ignore_state,
                    output,
                    progress,
                },
            )
            .await
        }
        Commands::Status { year } => status::cmd_status(&settings, year).await,
        Commands::Cleanup { year } => cleanup::cmd_cleanup(&settings, year).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;

    #[test]
    fn test_parse_archive_command() {
        let cli = Cli::try_parse_from([
            "gztarchiver",
            "archive",
            "--input",
            "records.json",
            "--year",
            "2024",
            "--month",
            "3",
            "--lang",
            "si",
        ])
        .unwrap();

        match cli.command {
            Commands::Archive { filter, .. } => {
                assert_eq!(filter.year, 2024);
                assert_eq!(filter.month, Some(3));
                assert_eq!(filter.lang, LanguageFilter::Only(Language::Sinhala));
            }
            _ => panic!("expected archive command"),
        }
    }

    #[test]
    fn test_day_requires_month() {
        let result = Cli::try_parse_from([
            "gztarchiver",
            "archive",
            "--input",
            "r.json",
            "--year",
            "2024",
            "--day",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_month_out_of_range() {
        let result = Cli::try_parse_from([
            "gztarchiver",
            "archive",
            "--input",
            "r.json",
            "--year",
            "2024",
            "--month",
            "13",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_language_rejected() {
        let result = Cli::try_parse_from([
            "gztarchiver",
            "archive",
            "--input",
            "r.json",
            "--year",
            "2024",
            "--lang",
            "fr",
        ]);
        assert!(result.is_err());
    }
}
