//! Archive command: fetch one batch for a year.

use std::path::PathBuf;

use console::style;
use tokio::sync::mpsc;

use super::FilterArgs;
use crate::cli::progress::BatchProgress;
use crate::config::Settings;
use crate::models::ArchiveFilter;
use crate::services::{
    ArchiveContext, ArchiveOptions, DownloadEvent, JsonFileSink, RunSummary, SkipReason,
};

/// Parsed `archive` arguments not folded into [`Settings`].
pub struct ArchiveRequest {
    pub input: PathBuf,
    pub filter: FilterArgs,
    pub start_index: Option<usize>,
    pub ignore_state: bool,
    pub output: Option<PathBuf>,
    pub progress: bool,
}

pub async fn cmd_archive(settings: &Settings, request: ArchiveRequest) -> anyhow::Result<()> {
    let filter = ArchiveFilter {
        year: request.filter.year,
        month: request.filter.month,
        day: request.filter.day,
        lang: request.filter.lang,
    };
    let options = ArchiveOptions {
        filter,
        batch_size: settings.batch_size,
        start_index: request.start_index,
        ignore_state: request.ignore_state,
    };

    let (event_tx, mut event_rx) = mpsc::channel::<DownloadEvent>(100);
    let mut ctx = ArchiveContext::open(settings, filter.year)?.with_events(event_tx);
    if let Some(output) = request.output {
        ctx = ctx.with_sink(Box::new(JsonFileSink::new(output)));
    }

    println!(
        "{} Archiving {} into {} ({} concurrent, {}ms between requests)",
        style("→").cyan(),
        describe_filter(&filter),
        ctx.year_dir().display(),
        settings.concurrency,
        settings.request_delay_ms
    );

    let listener = ctx.shutdown().listen();

    // Event handler task (UI layer)
    let show_progress = request.progress;
    let event_handler = tokio::spawn(async move {
        let mut progress: Option<BatchProgress> = None;
        let (mut downloaded, mut skipped, mut failed) = (0usize, 0usize, 0usize);

        while let Some(event) = event_rx.recv().await {
            match event {
                DownloadEvent::BatchStarted { candidates } => {
                    if show_progress {
                        progress = Some(BatchProgress::new(candidates as u64));
                    }
                }
                DownloadEvent::Started { key, .. } => {
                    if let Some(ref p) = progress {
                        p.set_message(&key.to_string());
                    }
                }
                DownloadEvent::Completed { .. } => {
                    downloaded += 1;
                    if let Some(ref p) = progress {
                        p.set_summary(downloaded, skipped, failed);
                        p.advance();
                    }
                }
                DownloadEvent::Skipped { key, reason } => {
                    skipped += 1;
                    if let Some(ref p) = progress {
                        if reason == SkipReason::RetriesExhausted {
                            p.println(&format!(
                                "  {} {} skipped after repeated failures",
                                style("→").dim(),
                                key
                            ));
                        }
                        p.set_summary(downloaded, skipped, failed);
                        p.advance();
                    }
                }
                DownloadEvent::Failed { url, error, .. } => {
                    failed += 1;
                    if let Some(ref p) = progress {
                        p.fail_line(&url, &error);
                        p.set_summary(downloaded, skipped, failed);
                        p.advance();
                    } else {
                        eprintln!(
                            "{} Failed to download {}: {}",
                            style("✗").red(),
                            url,
                            error
                        );
                    }
                }
            }
        }

        if let Some(p) = progress {
            p.finish();
        }
    });

    let result = ctx.run_file(&request.input, &options).await;

    // The scheduler dropped its sender, so the handler drains and exits.
    drop(ctx);
    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    listener.abort();

    let summary = result?;
    print_summary(&summary);
    Ok(())
}

fn describe_filter(filter: &ArchiveFilter) -> String {
    let mut out = filter.year.to_string();
    if let Some(m) = filter.month {
        out.push_str(&format!("-{:02}", m));
    }
    if let Some(d) = filter.day {
        out.push_str(&format!("-{:02}", d));
    }
    format!("{} [{}]", out, filter.lang.code())
}

fn print_summary(summary: &RunSummary) {
    let download = &summary.download;

    if summary.window.is_empty() {
        println!("{} No candidates in this batch", style("!").yellow());
    } else {
        println!(
            "{} Batch [{}, {}) of {} ({})",
            style("✓").green(),
            summary.window.start,
            summary.window.start + download.consumed,
            summary.window.total,
            summary.window.source
        );
    }

    println!(
        "  {} downloaded, {} already archived, {} adopted, {} failed, {} over retry cap",
        download.downloaded, download.skipped, download.adopted, download.failed, download.exhausted
    );
    if download.dispatched() > 0 {
        println!("  Success rate: {:.1}%", summary.success_rate());
    }
    if summary.unavailable > 0 {
        println!(
            "  {} {} documents unavailable (marker written)",
            style("→").dim(),
            summary.unavailable
        );
    }
    if summary.date_fallbacks > 0 {
        println!(
            "  {} {} records had unparseable dates and were filed under today",
            style("!").yellow(),
            summary.date_fallbacks
        );
    }
    if summary.duplicates > 0 {
        println!(
            "  {} {} duplicate links dropped (same document and language)",
            style("!").yellow(),
            summary.duplicates
        );
    }
    if summary.cleanup.total() > 0 {
        println!(
            "  {} Removed {} partial files",
            style("→").dim(),
            summary.cleanup.total()
        );
    }

    if download.interrupted {
        println!(
            "{} Interrupted; next run resumes at {}",
            style("!").yellow(),
            summary.next_index()
        );
    } else if summary.checkpoint.completed {
        println!(
            "{} All {} candidates processed; next run starts a new cycle",
            style("✓").green(),
            summary.window.total
        );
    } else {
        println!(
            "  Progress: {}/{} ({} remaining)",
            summary.next_index(),
            summary.window.total,
            summary.remaining()
        );
    }

    println!("  Archived log: {}", summary.archived_log.display());
    if download.failed > 0 || download.exhausted > 0 {
        println!("  Failed log:   {}", summary.failed_log.display());
    }
}
