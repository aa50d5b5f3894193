//! 📊 progress.rs: "Are we there yet?" asks every bulk push, every time, forever.
//!
//! 🚀 Two things live here:
//! - [`IngestProgress`]: a progress bar every worker can tick, because N workers
//!   racing through N partitions deserve one shared scoreboard.
//! - [`failure_report`]: a comfy table of what failed, so the post-mortem reads like
//!   a receipt instead of a stack trace.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::errors::RecordError;

/// 📊 Shared record-level progress for one bulk call.
///
/// Cheap to clone: the bar and the failure counter are both reference-counted,
/// so each worker holds its own handle to the same display.
#[derive(Clone)]
pub struct IngestProgress {
    bar: ProgressBar,
    failed: Arc<AtomicU64>,
}

impl std::fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("IngestProgress")
            .field("position", &self.bar.position())
            .field("failed", &self.failed.load(Ordering::Relaxed))
            .finish()
    }
}

impl IngestProgress {
    /// 🎨 A visible bar on stderr for `total_records` records.
    pub fn new(label: impl Into<String>, total_records: u64) -> Self {
        let bar = ProgressBar::new(total_records);
        // 🐛 template is a hardcoded literal; a bad one falls back to the default style
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} records {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_prefix(label.into());
        Self {
            bar,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 🙈 Same counters, nothing drawn. For tests and `--quiet` runs.
    pub fn hidden(total_records: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_records), ProgressDrawTarget::hidden());
        Self {
            bar,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// ✅ / 💀 One record attempted.
    pub fn record_done(&self, succeeded: bool) {
        if !succeeded {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_message(format!("({failed} failed)"));
        }
        self.bar.inc(1);
    }

    pub fn attempted(&self) -> u64 {
        self.bar.position()
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// 🏁 Ring the bell. We made it.
    pub fn finish(&self) {
        self.bar.finish();
    }
}

/// 🍽️ Render failures as a table: object, kind, detail. Empty input, empty string.
pub fn failure_report(errors: &[RecordError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["object", "kind", "detail"]);
    for failure in errors {
        table.add_row(vec![
            Cell::new(&failure.object),
            Cell::new(failure.kind().to_string()),
            Cell::new(failure.error.to_string()).set_alignment(CellAlignment::Left),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IngestError;

    #[test]
    fn the_one_where_workers_share_one_scoreboard() {
        let progress = IngestProgress::hidden(4);
        let worker_a = progress.clone();
        let worker_b = progress.clone();
        worker_a.record_done(true);
        worker_a.record_done(false);
        worker_b.record_done(true);
        worker_b.record_done(false);
        assert_eq!(progress.attempted(), 4);
        assert_eq!(progress.failed(), 2);
    }

    #[test]
    fn the_one_where_the_report_lists_every_failure() {
        let report = failure_report(&[
            RecordError::new("A", IngestError::ConnectionClosed),
            RecordError::new(
                "C",
                IngestError::Rejected {
                    reason: "rejected(C)".into(),
                },
            ),
        ]);
        assert!(report.contains("connection closed"));
        assert!(report.contains("transport error"));
        assert!(report.contains("rejected(C)"));
    }

    #[test]
    fn the_one_where_no_failures_means_no_table() {
        assert!(failure_report(&[]).is_empty());
    }
}
