//! # Task Optimizer Module
//!
//! Worker per l'ottimizzazione di un singolo file.
//!
//! ## Protocollo backup/compare:
//! 1. Rinomina il sorgente in `<stem>_bak.<ext>`
//! 2. Esegue la strategia `backup → path originale`
//! 3. [`TaskOptimizer::finalize`] confronta le dimensioni:
//!    - nuovo file assente o non strettamente più piccolo → scarta e ripristina il backup
//!    - più piccolo con preserve → copia timestamp e permessi del backup
//!    - senza keep il backup viene eliminato
//!
//! TAR e BMP/GIF/TIFF non passano dal backup: il TAR produce uno ZIP accanto
//! all'originale, le immagini alternative vengono ottimizzate sul posto.

use crate::{
    archive::ArchiveRepacker,
    classifier::{is_alternate_image, lowercase_extension, FormatClassifier, Strategy},
    config::Config,
    error::OptimizeError,
    file_manager::FileManager,
    hdf5::Hdf5Repacker,
    image_processor::ImageProcessor,
    ooxml::OoxmlRepacker,
    optimizer::path_resolver::PathResolver,
    tar_convert::TarConverter,
    tool_resolver::ToolTable,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// What happened to a processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    /// Optimized output replaced the original
    Replaced,
    /// Output was missing or not smaller; original restored
    Restored,
    /// TAR converted into the given ZIP
    Converted(PathBuf),
    /// Optimized in place without a backup
    InPlace,
}

/// Sizes and action for one processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub original_size: u64,
    pub final_size: u64,
    pub action: FileAction,
}

/// Worker per elaborazione singoli file
pub struct TaskOptimizer<'a> {
    tools: &'a ToolTable,
    config: &'a Config,
    warned_in_place: bool,
}

impl<'a> TaskOptimizer<'a> {
    pub fn new(tools: &'a ToolTable, config: &'a Config) -> Self {
        Self { tools, config, warned_in_place: false }
    }

    /// Processa un singolo file; `None` se non supportato o saltato
    pub async fn process_single_file(&mut self, file_path: &Path) -> Result<Option<FileReport>> {
        let strategy = FormatClassifier::new(self.tools).classify_path(file_path);
        if strategy == Strategy::Unsupported {
            trace!("Ignoring unsupported file {}", file_path.display());
            return Ok(None);
        }

        let original_size = FileManager::file_size(file_path).await?;
        debug!("Processing {} ({} bytes) with {}", file_path.display(), original_size, strategy);

        match strategy {
            Strategy::TarConvert => self.convert_tar(file_path, original_size).await,
            Strategy::PngOptimize if Self::is_in_place(file_path) => {
                self.optimize_in_place(file_path, original_size).await.map(Some)
            }
            _ => self.optimize_with_backup(file_path, strategy).await,
        }
    }

    fn is_in_place(file_path: &Path) -> bool {
        lowercase_extension(file_path).is_some_and(|ext| is_alternate_image(&ext))
    }

    async fn convert_tar(&self, file_path: &Path, original_size: u64) -> Result<Option<FileReport>> {
        let zip_path = PathResolver::tar_output_path(file_path);
        if tokio::fs::try_exists(&zip_path).await? {
            warn!(
                "Skipping {}: output {} already exists",
                file_path.display(),
                zip_path.display()
            );
            return Ok(None);
        }

        let conversion = match TarConverter::convert(file_path, Some(&zip_path)).await {
            Ok(conversion) => conversion,
            Err(e) => {
                warn!("{} failed on {}: {:#}", Strategy::TarConvert, file_path.display(), e);
                return Ok(None);
            }
        };
        let final_size = FileManager::file_size(&conversion.zip_path).await?;

        Ok(Some(FileReport {
            path: file_path.to_path_buf(),
            original_size,
            final_size,
            action: FileAction::Converted(conversion.zip_path),
        }))
    }

    async fn optimize_in_place(&mut self, file_path: &Path, original_size: u64) -> Result<FileReport> {
        if !self.warned_in_place {
            warn!("BMP/GIF/TIFF files are optimized in place without a backup");
            self.warned_in_place = true;
        }

        let outcome = ImageProcessor::new(self.tools, self.config)
            .optimize_in_place(file_path)
            .await?;
        if !outcome.is_improved() {
            debug!("{} left unchanged ({:?})", file_path.display(), outcome);
        }

        Ok(FileReport {
            path: file_path.to_path_buf(),
            original_size,
            final_size: FileManager::file_size(file_path).await?,
            action: FileAction::InPlace,
        })
    }

    async fn optimize_with_backup(&self, file_path: &Path, strategy: Strategy) -> Result<Option<FileReport>> {
        let backup_path = PathResolver::backup_path(file_path)?;
        if tokio::fs::try_exists(&backup_path).await? {
            warn!(
                "Skipping {}: backup path {} already exists",
                file_path.display(),
                backup_path.display()
            );
            return Ok(None);
        }

        tokio::fs::rename(file_path, &backup_path)
            .await
            .with_context(|| format!("Failed to move {} aside", file_path.display()))?;

        if let Err(e) = self.run_strategy(strategy, &backup_path, file_path).await {
            warn!("{} failed on {}: {:#}", strategy, file_path.display(), e);
            if tokio::fs::try_exists(file_path).await? {
                tokio::fs::remove_file(file_path).await?;
            }
        }

        Self::finalize(file_path, &backup_path, self.config).await.map(Some)
    }

    async fn run_strategy(&self, strategy: Strategy, source: &Path, dest: &Path) -> Result<()> {
        if let Some(tool) = strategy.prerequisite() {
            self.tools.require(tool)?;
        }

        match strategy {
            Strategy::ArchiveRepack => ArchiveRepacker::new(self.tools).repack(source, dest).await,
            Strategy::OoxmlRepack(kind) => OoxmlRepacker::new(self.tools, self.config)
                .repack(source, dest, kind)
                .await
                .map(|_| ()),
            Strategy::PngOptimize => ImageProcessor::new(self.tools, self.config)
                .optimize_png(source, dest)
                .await
                .map(|_| ()),
            Strategy::JpegOptimize => ImageProcessor::new(self.tools, self.config)
                .optimize_jpeg(source, dest, &self.config.jpeg_markers)
                .await
                .map(|_| ()),
            Strategy::Hdf5Repack => Hdf5Repacker::new(self.tools)
                .repack(source, dest, &self.config.hdf5_filter)
                .await
                .map(|_| ()),
            Strategy::TarConvert | Strategy::Unsupported => {
                Err(OptimizeError::UnsupportedFormat(format!("{} has no backup strategy", strategy)).into())
            }
        }
    }

    /// Decide between the new file at `original` and the file at `backup`
    pub async fn finalize(original: &Path, backup: &Path, config: &Config) -> Result<FileReport> {
        let backup_size = FileManager::file_size(backup).await?;
        let new_size = match tokio::fs::metadata(original).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };

        let (final_size, action) = match new_size {
            Some(new_size) if new_size < backup_size => {
                if config.preserve {
                    FileManager::copy_metadata(backup, original).await?;
                }
                if !config.keep {
                    tokio::fs::remove_file(backup)
                        .await
                        .with_context(|| format!("Failed to remove backup {}", backup.display()))?;
                }
                (new_size, FileAction::Replaced)
            }
            new_size => {
                if new_size.is_some() {
                    tokio::fs::remove_file(original).await?;
                }
                tokio::fs::rename(backup, original)
                    .await
                    .with_context(|| format!("Failed to restore {}", original.display()))?;
                (backup_size, FileAction::Restored)
            }
        };

        Ok(FileReport {
            path: original.to_path_buf(),
            original_size: backup_size,
            final_size,
            action,
        })
    }
}
