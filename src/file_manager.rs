//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file usate dal driver.
//!
//! ## Responsabilità:
//! - Espansione del pattern glob di input (ordine del crate `glob`)
//! - Dimensione dei file e calcolo percentuali
//! - Copia di timestamp e permessi (preserve mode)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Utilità:
//! - `human_size()`: Converte bytes in formato leggibile (B, kiB, MiB, GiB, TiB)
//! - `percent_of()`: Dimensione finale in percentuale dell'originale
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::expand_glob("*.zip")?;
//! for file in files {
//!     let size = FileManager::file_size(&file).await?;
//!     println!("{} {}", file.display(), FileManager::human_size(size));
//! }
//! ```

use crate::error::OptimizeError;
use anyhow::{Context, Result};
use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Manages file operations
pub struct FileManager;

impl FileManager {
    /// Expand a filename or glob pattern into the regular files it matches
    pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in glob::glob(pattern).map_err(OptimizeError::from)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(path) => debug!("Skipping non-file match {}", path.display()),
                Err(e) => warn!("Skipping unreadable match: {}", OptimizeError::from(e)),
            }
        }

        Ok(files)
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read metadata of {}", path.display()))?;
        Ok(metadata.len())
    }

    /// Copy access/modification times and permissions of `src` onto `dst`.
    ///
    /// `dst` is opened read-only: setting times needs ownership, not write access.
    pub async fn copy_metadata(src: &Path, dst: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(src).await?;

        let mut times = FileTimes::new();
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }

        let (dst_path, permissions) = (dst.to_path_buf(), metadata.permissions());
        tokio::task::spawn_blocking(move || -> Result<()> {
            File::open(&dst_path)
                .and_then(|file| file.set_times(times))
                .with_context(|| format!("Failed to set timestamps on {}", dst_path.display()))?;
            std::fs::set_permissions(&dst_path, permissions)
                .with_context(|| format!("Failed to set permissions on {}", dst_path.display()))?;
            Ok(())
        })
        .await??;

        debug!("Copied metadata {} -> {}", src.display(), dst.display());
        Ok(())
    }

    /// Get human-readable file size
    pub fn human_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "kiB", "MiB", "GiB", "TiB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Final size as a percentage of the original size
    pub fn percent_of(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            100.0
        } else {
            new_size as f64 / original_size as f64 * 100.0
        }
    }
}
