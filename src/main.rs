//! # rypak - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (stderr, filtro da `RUST_LOG`)
//! - Caricamento della configurazione e override da CLI
//! - Ricerca dei tool esterni e avvio del `BatchOptimizer`
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (pattern, preserve, keep, quiet, ...)
//! 2. Configura il logging (WARN o DEBUG a seconda del flag debug)
//! 3. Carica il file di configurazione se indicato, poi applica i flag
//! 4. Costruisce la `ToolTable` una sola volta
//! 5. Elabora ogni file che corrisponde al pattern
//!
//! ## Esempio di utilizzo:
//! ```bash
//! rypak '*.docx' --keep
//! rypak --list-tools
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rypak::{BatchOptimizer, Config, FormatClassifier, ToolPathResolver};

#[derive(Parser)]
#[command(name = "rypak")]
#[command(version)]
#[command(about = "Losslessly shrink archives, Office documents, images and HDF5 files")]
struct Args {
    /// Filename or glob pattern of the files to process
    #[arg(required_unless_present = "list_tools")]
    pattern: Option<String>,

    /// Do not copy timestamps and permissions onto optimized files
    #[arg(long)]
    no_preserve: bool,

    /// Keep the `<name>_bak.<ext>` backup of every processed file
    #[arg(short, long)]
    keep: bool,

    /// Do not print per-file and total size lines
    #[arg(short, long)]
    quiet: bool,

    /// HDF5 filter passed to h5repack (e.g. GZIP=9)
    #[arg(long, value_name = "FILTER")]
    h5_filter: Option<String>,

    /// JSON configuration file, overridden by command line flags
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the external tools found and the accepted extensions
    #[arg(long)]
    list_tools: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if self.no_preserve {
            config.preserve = false;
        }
        if self.keep {
            config.keep = true;
        }
        if self.quiet {
            config.quiet = true;
        }
        if let Some(ref filter) = self.h5_filter {
            config.hdf5_filter = filter.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;
    debug!("Configuration: {:?}", config);

    let tools = ToolPathResolver::new().resolve_all();

    if args.list_tools {
        println!("{}", tools.tools_report());
        println!(
            "Accepted extensions: {}",
            FormatClassifier::new(&tools).accepted_extensions().join(", ")
        );
        return Ok(());
    }

    if let Some(ref pattern) = args.pattern {
        BatchOptimizer::new(&tools, &config).run(pattern).await?;
    }

    Ok(())
}
