//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con le opzioni di repack
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `preserve`: Copia timestamp e permessi dell'originale sul file ottimizzato (default: true)
//! - `keep`: Mantiene il file di backup `<nome>_bak.<ext>` (default: false)
//! - `quiet`: Nessun riepilogo per file / totale su stdout (default: false)
//! - `hdf5_filter`: Filtro passato a `h5repack -f` (default: "GZIP=9")
//! - `jpeg_markers`: Modalità `-copy` di jpegtran (default: "none")
//! - `png_level`: Livello di ottimizzazione optipng (default: 5)
//!
//! ## Validazione:
//! - `hdf5_filter` non può essere vuoto
//! - `png_level` deve essere 0-7
//! - `jpeg_markers` deve essere none, comments, icc oppure all
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     keep: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::OptimizeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const JPEG_MARKER_MODES: &[&str] = &["none", "comments", "icc", "all"];

/// Configuration for a repack run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Copy timestamps and permissions of the original onto the optimized file
    pub preserve: bool,
    /// Keep the `<stem>_bak.<ext>` backup after processing
    pub keep: bool,
    /// Suppress per-file and total summary lines
    pub quiet: bool,
    /// Filter handed to h5repack
    pub hdf5_filter: String,
    /// jpegtran `-copy` mode for recompressed JPEGs
    pub jpeg_markers: String,
    /// optipng optimization level
    pub png_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preserve: true,
            keep: false,
            quiet: false,
            hdf5_filter: crate::hdf5::DEFAULT_FILTER.to_string(),
            jpeg_markers: "none".to_string(),
            png_level: 5,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.hdf5_filter.trim().is_empty() {
            return Err(OptimizeError::Validation("HDF5 filter must not be empty".to_string()).into());
        }

        if self.png_level > 7 {
            return Err(OptimizeError::Validation("PNG optimization level must be between 0 and 7".to_string()).into());
        }

        if !JPEG_MARKER_MODES.contains(&self.jpeg_markers.as_str()) {
            return Err(OptimizeError::Validation(format!(
                "JPEG marker mode must be one of: {}",
                JPEG_MARKER_MODES.join(", ")
            )).into());
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.png_level = 8;
        assert!(config.validate().is_err());

        config.png_level = 5;
        config.hdf5_filter = "  ".to_string();
        assert!(config.validate().is_err());

        config.hdf5_filter = "SHUF".to_string();
        config.jpeg_markers = "exif".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.preserve);
        assert!(!config.keep);
        assert!(!config.quiet);
        assert_eq!(config.hdf5_filter, "GZIP=9");
        assert_eq!(config.jpeg_markers, "none");
        assert_eq!(config.png_level, 5);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            preserve: false,
            keep: true,
            hdf5_filter: "SZIP=8,NN".to_string(),
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert!(!loaded_config.preserve);
        assert!(loaded_config.keep);
        assert!(!loaded_config.quiet);
        assert_eq!(loaded_config.hdf5_filter, "SZIP=8,NN");
        assert_eq!(loaded_config.png_level, 5);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert!(config.preserve);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        tokio::fs::write(&config_path, r#"{ "keep": true }"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert!(config.keep);
        assert!(config.preserve);
        assert_eq!(config.hdf5_filter, "GZIP=9");
    }
}
