//! Progress display for archive batches.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Single bar tracking candidates of one batch window.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    pub fn set_message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    pub fn advance(&self) {
        self.bar.inc(1);
    }

    pub fn set_summary(&self, downloaded: usize, skipped: usize, failed: usize) {
        self.bar.set_message(format!(
            "{} new, {} skipped, {} failed",
            downloaded, skipped, failed
        ));
    }

    /// Print a line above the bar.
    pub fn println(&self, msg: &str) {
        self.bar.println(msg);
    }

    pub fn fail_line(&self, url: &str, error: &str) {
        self.println(&format!("{} Failed to download {}: {}", style("✗").red(), url, error));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
