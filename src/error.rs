//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, disco pieno)
//! - `Zip`: Archivi ZIP corrotti o non leggibili
//! - `Pattern` / `Glob`: Pattern di input non valido o path non leggibile
//! - `Archive`: Errori di estrazione/ricostruzione archivi
//! - `UnsupportedFormat`: Estensione non gestita dalla dispatch table
//! - `MissingDependency`: Tool esterno mancante (7z, optipng, jpegtran, h5repack)
//! - `Validation`: Errori di validazione configurazione
//! - `Timestamp`: Timestamp non rappresentabile nel formato di destinazione
//!
//! ## Nota:
//! Gli errori dei tool esterni non arrivano quasi mai qui: un tool mancante o
//! fallito diventa `ToolOutcome::Unavailable` / `ToolOutcome::NoChange` e il
//! driver ripristina il file originale. Solo gli errori del filesystem del
//! driver interrompono l'esecuzione.
//!
//! ## Esempio:
//! ```rust,ignore
//! if !tools.contains(Tool::Hdf5Repacker) {
//!     return Err(OptimizeError::MissingDependency("h5repack".to_string()));
//! }
//! ```

/// Custom error types for file repacking
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unreadable glob match: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Timestamp error: {0}")]
    Timestamp(String),
}
