//! Status command: checkpoint and ledger counts for a year.

use console::style;

use crate::config::Settings;
use crate::repository::{CheckpointStore, ProgressLedger};

pub async fn cmd_status(settings: &Settings, year: i32) -> anyhow::Result<()> {
    let year_dir = settings.year_dir(year);
    if !year_dir.exists() {
        println!(
            "{} Nothing archived for {} yet ({})",
            style("!").yellow(),
            year,
            year_dir.display()
        );
        return Ok(());
    }

    println!("\n{}", style(format!("Archive Status: {}", year)).bold());
    println!("{}", "-".repeat(40));

    match CheckpointStore::new(&year_dir).load() {
        Some(cp) => {
            let state = if cp.completed {
                style("Complete").green().to_string()
            } else {
                style("In Progress").yellow().to_string()
            };
            println!("{:<20} {}", "Cycle:", state);
            println!(
                "{:<20} month={} day={} lang={}",
                "Filter:",
                cp.filter.month.as_deref().unwrap_or("*"),
                cp.filter.day.as_deref().unwrap_or("*"),
                cp.filter.lang
            );
            println!(
                "{:<20} {}/{} ({} remaining)",
                "Progress:",
                cp.next_index(),
                cp.total_docs_in_current_filter,
                cp.remaining()
            );
            println!("{:<20} {}", "Batch size:", cp.batch_size);
            println!(
                "{:<20} {} ({} candidates)",
                "Last run:",
                cp.last_run.format("%Y-%m-%d %H:%M:%S"),
                cp.processed_in_last_batch
            );
        }
        None => println!("{:<20} {}", "Cycle:", style("Not Started").dim()),
    }

    let summary = ProgressLedger::summarize(&year_dir, settings.max_retries)?;
    println!();
    println!("{:<20} {}", "Archived:", summary.archived_keys);
    println!("{:<20} {}", "Unavailable:", summary.empty_rows);
    println!(
        "{:<20} {} ({} attempts)",
        "Failing:", summary.failed_keys, summary.failed_rows
    );
    if summary.exhausted_keys > 0 {
        println!(
            "{:<20} {}",
            "Over retry cap:",
            style(summary.exhausted_keys).red()
        );
    }

    Ok(())
}
