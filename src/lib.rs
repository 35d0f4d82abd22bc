//! # rypak Library
//!
//! Riduzione lossless della dimensione di archivi, documenti Office,
//! immagini e file HDF5 tramite ricompressione della struttura interna.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `tool_resolver`: Ricerca dei tool esterni e `ToolTable` immutabile
//! - `process`: Invocazione dei tool esterni e costruzione argomenti
//! - `classifier`: Tabella estensione → strategia
//! - `archive`: Repack ZIP, `ScratchDir`, conversioni timestamp
//! - `ooxml`: Ricompressione dei media dentro docx/xlsx/pptx
//! - `image_processor`: PNG/JPEG tramite optipng/jpegtran, `ToolOutcome`
//! - `hdf5`: Repack HDF5 tramite h5repack
//! - `tar_convert`: Conversione TAR → ZIP
//! - `file_manager`: Glob, dimensioni, metadata
//! - `progress`: Progress bar, statistiche e righe di riepilogo
//! - `optimizer`: Driver del run (batch, singolo file, path)
//! - `config` / `error`: Configurazione e tipi di errore
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use rypak::{BatchOptimizer, Config, ToolPathResolver};
//!
//! let tools = ToolPathResolver::new().resolve_all();
//! let config = Config::default();
//! let stats = BatchOptimizer::new(&tools, &config).run("*.zip").await?;
//! ```

pub mod archive;
pub mod classifier;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod hdf5;
pub mod image_processor;
pub mod ooxml;
pub mod optimizer;
pub mod process;
pub mod progress;
pub mod tar_convert;
pub mod tool_resolver;

pub use classifier::{FormatClassifier, Strategy};
pub use config::Config;
pub use error::OptimizeError;
pub use image_processor::ToolOutcome;
pub use optimizer::{BatchOptimizer, FileAction, FileReport, TaskOptimizer};
pub use progress::OptimizationStats;
pub use tool_resolver::{Tool, ToolPathResolver, ToolTable};
