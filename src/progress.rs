//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress e le statistiche di un run.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif` su stderr durante l'elaborazione
//! - Righe di riepilogo per file e totale su stdout
//! - Accumulo delle dimensioni originali e finali
//!
//! ## Formato riga di riepilogo:
//! ```text
//! photo.png ... 10000 to 8000 (80.0%) [diff = 1.95 kiB]
//! TOTAL ... 25000 to 21000 (84.0%) [diff = 3.91 kiB]
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let progress = ProgressManager::new(files.len() as u64, config.quiet);
//! let mut stats = OptimizationStats::new();
//!
//! stats.add(original_size, final_size);
//! progress.report(&SizeSummary::new("photo.png", original_size, final_size).to_string());
//!
//! progress.finish();
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;

/// Label of the grand-total line
pub const TOTAL_LABEL: &str = "TOTAL";

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    quiet: bool,
}

impl ProgressManager {
    /// Create a new progress manager; quiet mode draws and prints nothing
    pub fn new(total_files: u64, quiet: bool) -> Self {
        if quiet {
            return Self { bar: ProgressBar::hidden(), quiet };
        }

        let bar = ProgressBar::new(total_files);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar, quiet }
    }

    /// Show the file currently being processed
    pub fn start_file(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    /// Advance by one file
    pub fn advance(&self) {
        self.bar.inc(1);
    }

    /// Print a line to stdout above the bar
    pub fn report(&self, line: &str) {
        if !self.quiet {
            self.bar.suspend(|| println!("{}", line));
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// `label ... sizeA to sizeB (pct%) [diff = humanSize]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeSummary {
    pub label: String,
    pub original_size: u64,
    pub final_size: u64,
}

impl SizeSummary {
    pub fn new(label: impl Into<String>, original_size: u64, final_size: u64) -> Self {
        Self { label: label.into(), original_size, final_size }
    }
}

impl fmt::Display for SizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diff = if self.final_size <= self.original_size {
            FileManager::human_size(self.original_size - self.final_size)
        } else {
            format!("-{}", FileManager::human_size(self.final_size - self.original_size))
        };
        write!(
            f,
            "{} ... {} to {} ({:.1}%) [diff = {}]",
            self.label,
            self.original_size,
            self.final_size,
            FileManager::percent_of(self.original_size, self.final_size),
            diff
        )
    }
}

/// Statistics tracker for a batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_improved: usize,
    pub files_unchanged: usize,
    pub total_original_size: u64,
    pub total_final_size: u64,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, original_size: u64, final_size: u64) {
        self.files_processed += 1;
        if final_size < original_size {
            self.files_improved += 1;
        } else {
            self.files_unchanged += 1;
        }
        self.total_original_size += original_size;
        self.total_final_size += final_size;
    }

    pub fn bytes_saved(&self) -> u64 {
        self.total_original_size.saturating_sub(self.total_final_size)
    }

    /// Grand-total summary line
    pub fn total_summary(&self) -> SizeSummary {
        SizeSummary::new(TOTAL_LABEL, self.total_original_size, self.total_final_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_format() {
        let line = SizeSummary::new("photo.png", 10_000, 8_000).to_string();
        assert_eq!(line, "photo.png ... 10000 to 8000 (80.0%) [diff = 1.95 kiB]");
    }

    #[test]
    fn test_summary_line_growth() {
        let line = SizeSummary::new("bundle.tar", 1_000, 2_024).to_string();
        assert_eq!(line, "bundle.tar ... 1000 to 2024 (202.4%) [diff = -1.00 kiB]");
    }

    #[test]
    fn test_stats_accumulate() {
        let mut stats = OptimizationStats::new();
        stats.add(10_000, 8_000);
        stats.add(10_000, 10_000);

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_improved, 1);
        assert_eq!(stats.files_unchanged, 1);
        assert_eq!(stats.bytes_saved(), 2_000);
        assert_eq!(
            stats.total_summary().to_string(),
            "TOTAL ... 20000 to 18000 (90.0%) [diff = 1.95 kiB]"
        );
    }
}
