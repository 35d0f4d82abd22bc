//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path derivati da un file sorgente:
//! backup accanto all'originale e ZIP prodotto dalla conversione TAR.

use crate::tar_convert::TarConverter;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Utility per calcolare i path derivati in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Backup path beside the source: `<stem>_bak.<ext>`
    pub fn backup_path(input_path: &Path) -> Result<PathBuf> {
        let file_stem = input_path
            .file_stem()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", input_path.display()))?
            .to_string_lossy();

        let filename = match input_path.extension() {
            Some(ext) => format!("{}_bak.{}", file_stem, ext.to_string_lossy()),
            None => format!("{}_bak", file_stem),
        };
        Ok(input_path.with_file_name(filename))
    }

    /// ZIP written next to a converted TAR
    pub fn tar_output_path(input_path: &Path) -> PathBuf {
        TarConverter::zip_path_for(input_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path() {
        assert_eq!(
            PathResolver::backup_path(Path::new("/data/report.docx")).unwrap(),
            PathBuf::from("/data/report_bak.docx")
        );
        assert_eq!(
            PathResolver::backup_path(Path::new("photos.v2.ZIP")).unwrap(),
            PathBuf::from("photos.v2_bak.ZIP")
        );
        assert_eq!(PathResolver::backup_path(Path::new("plain")).unwrap(), PathBuf::from("plain_bak"));
    }

    #[test]
    fn test_backup_path_rejects_empty_name() {
        assert!(PathResolver::backup_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_tar_output_path() {
        assert_eq!(PathResolver::tar_output_path(Path::new("a/b.tar")), PathBuf::from("a/b.zip"));
    }
}
