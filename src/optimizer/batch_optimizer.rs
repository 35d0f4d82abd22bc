//! # Batch Optimizer
//!
//! Orchestratore principale: espande il pattern glob ed elabora i file
//! uno alla volta nell'ordine del glob.
//!
//! ## Responsabilità:
//! - Espansione del pattern tramite [`FileManager::expand_glob`]
//! - Delega di ogni file a [`TaskOptimizer`]
//! - Accumulo delle dimensioni e stampa delle righe di riepilogo
//!
//! Gli errori del filesystem propagati dal worker interrompono il run.

use crate::{
    config::Config,
    file_manager::FileManager,
    optimizer::task_optimizer::TaskOptimizer,
    progress::{OptimizationStats, ProgressManager, SizeSummary},
    tool_resolver::ToolTable,
};
use anyhow::Result;
use tracing::info;

/// Orchestratore di un run su un pattern
pub struct BatchOptimizer<'a> {
    tools: &'a ToolTable,
    config: &'a Config,
}

impl<'a> BatchOptimizer<'a> {
    pub fn new(tools: &'a ToolTable, config: &'a Config) -> Self {
        Self { tools, config }
    }

    /// Process every file matching `pattern` and return the accumulated sizes
    pub async fn run(&self, pattern: &str) -> Result<OptimizationStats> {
        let files = FileManager::expand_glob(pattern)?;
        info!("Processing {} files matching {}", files.len(), pattern);

        let progress = ProgressManager::new(files.len() as u64, self.config.quiet);
        let mut worker = TaskOptimizer::new(self.tools, self.config);
        let mut stats = OptimizationStats::new();

        for file in &files {
            let label = file.display().to_string();
            progress.start_file(&label);

            let report = match worker.process_single_file(file).await {
                Ok(report) => report,
                Err(e) => {
                    progress.finish();
                    return Err(e);
                }
            };

            if let Some(report) = report {
                stats.add(report.original_size, report.final_size);
                progress.report(&SizeSummary::new(label, report.original_size, report.final_size).to_string());
            }
            progress.advance();
        }

        progress.finish();
        if stats.files_processed > 0 {
            progress.report(&stats.total_summary().to_string());
        }

        info!(
            "Processed {} files ({} improved), saved {}",
            stats.files_processed,
            stats.files_improved,
            FileManager::human_size(stats.bytes_saved())
        );
        Ok(stats)
    }
}
