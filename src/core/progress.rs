//! Progress and warning events
//!
//! The pipeline reports through an [`Observer`] instead of touching any
//! presentation layer. Events are observability only; they never change
//! ordering or outcome.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

use crate::core::model::Warning;

pub trait Observer {
    /// Called before file `current` (1-based) of `total` is read
    fn on_progress(&mut self, _current: usize, _total: usize, _path: &str) {}

    /// Called for every recoverable, per-entry problem
    fn on_warning(&mut self, _warning: &Warning) {}

    /// Informational messages (scan root collapse, tokenizer degradation)
    fn on_notice(&mut self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Terminal progress bar on stderr, hidden when stderr is not a TTY
pub struct ProgressObserver {
    bar: Option<ProgressBar>,
    warnings: usize,
    enabled: bool,
}

impl ProgressObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: None,
            warnings: 0,
            enabled: !quiet && std::io::stderr().is_terminal(),
        }
    }

    fn bar(&mut self, total: usize) -> &ProgressBar {
        let enabled = self.enabled;
        self.bar.get_or_insert_with(|| {
            if !enabled {
                return ProgressBar::hidden();
            }
            let pb = ProgressBar::new(total as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse progress bar template: {e}");
                    ProgressStyle::default_bar()
                })
                .progress_chars("#>-");
            pb.set_style(style);
            pb
        })
    }

    /// Remove the bar from the terminal
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

impl Observer for ProgressObserver {
    fn on_progress(&mut self, current: usize, total: usize, path: &str) {
        let bar = self.bar(total);
        bar.set_position(current.saturating_sub(1) as u64);
        bar.set_message(path.to_string());
        if current == total {
            bar.set_position(total as u64);
        }
    }

    fn on_warning(&mut self, _warning: &Warning) {
        self.warnings += 1;
    }

    fn on_notice(&mut self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }
}

impl Drop for ProgressObserver {
    fn drop(&mut self) {
        self.finish();
    }
}
