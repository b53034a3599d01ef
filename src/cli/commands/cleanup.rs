//! Cleanup command: remove partial files left by an interrupted run.

use console::style;

use crate::config::Settings;
use crate::storage::cleanup_partial_files;

pub async fn cmd_cleanup(settings: &Settings, year: i32) -> anyhow::Result<()> {
    let year_dir = settings.year_dir(year);
    let report = cleanup_partial_files(&year_dir, settings.min_file_size);

    if report.total() == 0 {
        println!("{} No partial files under {}", style("✓").green(), year_dir.display());
        return Ok(());
    }

    for path in report.temp_files.iter().chain(&report.undersized_files) {
        println!("  {} {}", style("✗").red(), path.display());
    }
    println!(
        "{} Removed {} temp and {} undersized files",
        style("✓").green(),
        report.temp_files.len(),
        report.undersized_files.len()
    );
    Ok(())
}
