//! # Image Processing Module
//!
//! Questo modulo ottimizza immagini singole utilizzando esclusivamente tool
//! esterni, senza elaborazione in memoria.
//!
//! ## Formati e tool
//!
//! | Formato | Tool | Flag |
//! |---------|------|------|
//! | PNG     | optipng  | `-o5 -preserve -quiet -out <dst> <src>` |
//! | BMP/GIF/TIFF | optipng | `-o5 -preserve -quiet <file>` (in place) |
//! | JPEG    | jpegtran | `-optimize -progressive -copy <markers> -outfile <dst> <src>` |
//!
//! ## Risultato esplicito
//!
//! Ogni operazione ritorna un [`ToolOutcome`]:
//! - `Unavailable`: il tool non è nella `ToolTable`, nessun output prodotto
//! - `NoChange`: il tool è fallito oppure l'output non è più piccolo
//! - `Improved(bytes)`: l'output esiste ed è più piccolo dell'input
//!
//! In questo modo il chiamante distingue "niente da migliorare" da "tool
//! mancante" invece di ricevere un silenzioso no-op.

use crate::config::Config;
use crate::process::run_tool;
use crate::tool_resolver::{Tool, ToolTable};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// Result of one helper invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Output written, with its size in bytes
    Improved(u64),
    /// Tool ran but nothing smaller came out
    NoChange,
    /// Tool not installed
    Unavailable,
}

impl ToolOutcome {
    pub fn is_improved(&self) -> bool {
        matches!(self, ToolOutcome::Improved(_))
    }
}

/// Runs the PNG and JPEG optimizers
pub struct ImageProcessor<'a> {
    tools: &'a ToolTable,
    config: &'a Config,
}

impl<'a> ImageProcessor<'a> {
    pub fn new(tools: &'a ToolTable, config: &'a Config) -> Self {
        Self { tools, config }
    }

    /// Optimize a PNG from `src` into `dst`
    pub async fn optimize_png(&self, src: &Path, dst: &Path) -> Result<ToolOutcome> {
        let Some(optipng) = self.tools.get(Tool::PngOptimizer) else {
            debug!("{} unavailable, skipping {}", Tool::PngOptimizer, src.display());
            return Ok(ToolOutcome::Unavailable);
        };

        let args = crate::args![
            format!("-o{}", self.config.png_level),
            "-preserve",
            "-quiet",
            "-out", dst.display(),
            src.display(),
        ];
        let success = run_tool(optipng, &args, None).await?;
        compare_output(src, dst, success).await
    }

    /// Optimize a JPEG from `src` into `dst`; `markers` is the jpegtran `-copy` mode
    pub async fn optimize_jpeg(&self, src: &Path, dst: &Path, markers: &str) -> Result<ToolOutcome> {
        let Some(jpegtran) = self.tools.get(Tool::JpegOptimizer) else {
            debug!("{} unavailable, skipping {}", Tool::JpegOptimizer, src.display());
            return Ok(ToolOutcome::Unavailable);
        };

        let args = crate::args![
            "-optimize",
            "-progressive",
            "-copy", markers,
            "-outfile", dst.display(),
            src.display(),
        ];
        let success = run_tool(jpegtran, &args, None).await?;
        compare_output(src, dst, success).await
    }

    /// Run the PNG optimizer directly on `path`, overwriting it.
    ///
    /// Used for BMP/GIF/TIFF. No backup is taken; the returned outcome
    /// compares the file size before and after the run.
    pub async fn optimize_in_place(&self, path: &Path) -> Result<ToolOutcome> {
        let Some(optipng) = self.tools.get(Tool::PngOptimizer) else {
            return Ok(ToolOutcome::Unavailable);
        };

        let before = tokio::fs::metadata(path).await?.len();
        let args = crate::args![format!("-o{}", self.config.png_level), "-preserve", "-quiet", path.display()];
        if !run_tool(optipng, &args, None).await? {
            return Ok(ToolOutcome::NoChange);
        }

        let after = tokio::fs::metadata(path).await?.len();
        Ok(if after < before { ToolOutcome::Improved(after) } else { ToolOutcome::NoChange })
    }
}

/// Turn a finished helper run into an outcome, discarding useless output
pub(crate) async fn compare_output(src: &Path, dst: &Path, success: bool) -> Result<ToolOutcome> {
    let output_size = match tokio::fs::metadata(dst).await {
        Ok(meta) if success => Some(meta.len()),
        Ok(_) => {
            tokio::fs::remove_file(dst).await?;
            None
        }
        Err(_) => None,
    };

    let Some(output_size) = output_size else {
        return Ok(ToolOutcome::NoChange);
    };

    let input_size = tokio::fs::metadata(src).await?.len();
    if output_size < input_size {
        debug!("{} -> {}: {} to {} bytes", src.display(), dst.display(), input_size, output_size);
        Ok(ToolOutcome::Improved(output_size))
    } else {
        Ok(ToolOutcome::NoChange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_tools_are_unavailable() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.png");
        let dst = dir.path().join("b.png");
        tokio::fs::write(&src, b"not really a png").await.unwrap();

        let tools = ToolTable::empty();
        let config = Config::default();
        let processor = ImageProcessor::new(&tools, &config);

        assert_eq!(processor.optimize_png(&src, &dst).await.unwrap(), ToolOutcome::Unavailable);
        assert_eq!(processor.optimize_jpeg(&src, &dst, "none").await.unwrap(), ToolOutcome::Unavailable);
        assert_eq!(processor.optimize_in_place(&src).await.unwrap(), ToolOutcome::Unavailable);
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_compare_output_outcomes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        tokio::fs::write(&src, vec![0u8; 100]).await.unwrap();

        assert_eq!(compare_output(&src, &dst, true).await.unwrap(), ToolOutcome::NoChange);

        tokio::fs::write(&dst, vec![0u8; 60]).await.unwrap();
        assert_eq!(compare_output(&src, &dst, true).await.unwrap(), ToolOutcome::Improved(60));

        tokio::fs::write(&dst, vec![0u8; 100]).await.unwrap();
        assert_eq!(compare_output(&src, &dst, true).await.unwrap(), ToolOutcome::NoChange);

        tokio::fs::write(&dst, vec![0u8; 10]).await.unwrap();
        assert_eq!(compare_output(&src, &dst, false).await.unwrap(), ToolOutcome::NoChange);
        assert!(!dst.exists(), "partial output of a failed run is removed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_no_change() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("b.jpg");
        tokio::fs::write(&src, b"jpeg bytes").await.unwrap();

        let tools = ToolTable::empty().with(Tool::JpegOptimizer, "false");
        let config = Config::default();
        let processor = ImageProcessor::new(&tools, &config);

        assert_eq!(processor.optimize_jpeg(&src, &dst, "none").await.unwrap(), ToolOutcome::NoChange);
    }
}
